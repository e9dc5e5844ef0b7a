// cli.rs - Command-line interface configuration
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "raytraced")]
#[command(about = "Interactive path-traced scene editor", long_about = None)]
pub struct Cli {
    /// Scene document to open (JSON); starts with the default scene if omitted
    #[arg(long = "scene")]
    pub scene: Option<PathBuf>,

    /// Initial window width in pixels
    #[arg(long, default_value = "800")]
    pub width: u32,

    /// Initial window height in pixels
    #[arg(long, default_value = "600")]
    pub height: u32,
}
