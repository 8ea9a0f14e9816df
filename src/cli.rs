use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::highlight::DEFAULT_RENDER_SCALE;

#[derive(Parser, Debug)]
#[command(
    name = "examsched",
    version,
    about = "Locate exam schedule entries in the published exam PDF"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Resolve(ResolveArgs),
    Render(RenderArgs),
    Variants(VariantsArgs),
    Layout(LayoutArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    #[arg(long, default_value = "exam.json")]
    pub exams: PathBuf,

    #[arg(long, default_value = "exam.pdf")]
    pub pdf: PathBuf,

    #[arg(long = "pick")]
    pub picks: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub ignore_page_hints: bool,

    #[arg(long, default_value_t = false)]
    pub parallel: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long, default_value = "rendered")]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = DEFAULT_RENDER_SCALE)]
    pub scale: f32,

    #[arg(long)]
    pub routine_image: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct VariantsArgs {
    #[arg(long)]
    pub course: String,

    #[arg(long)]
    pub section: String,
}

#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    #[arg(long, default_value = "exam.pdf")]
    pub pdf: PathBuf,

    #[arg(long)]
    pub page: usize,
}
