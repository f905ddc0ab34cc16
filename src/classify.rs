//! Classify one image file from the terminal

use anyhow::{anyhow, Context};
use helmet_check::config::Settings;
use helmet_check::ingest::UploadedImage;
use helmet_check::util::init_tracing;
use helmet_check::vision::OpenAiClient;
use helmet_check::workflow::Classifier;
use std::path::PathBuf;
use std::sync::Arc;
use std::{env, process};

const USAGE: &str = "usage: ./helmet-classify <image file>";

/// The image path, if exactly one argument follows the program name
fn image_path(args: &[String]) -> Option<PathBuf> {
    match args {
        [_, path] => Some(PathBuf::from(path)),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let Some(path) = image_path(&args) else {
        println!("{USAGE}");
        process::exit(1);
    };

    let settings = Settings::load(None).context("could not load settings")?;
    let wording = settings.preset.wording();

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} is not a file", path.display()))?;
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("could not read {}", path.display()))?;
    let image = UploadedImage::from_file(name, bytes)?.decode(settings.upload.max_bytes)?;

    let model = OpenAiClient::new(&settings.model)?;
    let classifier = Classifier::new(Arc::new(model), settings.preset);

    println!("{}", wording.title);
    println!("{} ({}x{})", wording.processing_label, image.width(), image.height());

    match classifier.classify(&image).await {
        Ok(verdict) => {
            println!("{}", verdict.message);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", classifier.error_message(&e));
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_path() {
        let args = |list: &[&str]| list.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        assert_eq!(image_path(&args(&[])), None);
        assert_eq!(image_path(&args(&["helmet-classify"])), None);
        assert_eq!(
            image_path(&args(&["helmet-classify", "rider.jpg"])),
            Some(PathBuf::from("rider.jpg"))
        );
        assert_eq!(image_path(&args(&["helmet-classify", "a.jpg", "b.jpg"])), None);
    }
}
