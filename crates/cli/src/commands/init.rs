//! `skyhook init` — Write a starter config file.

use std::path::Path;

use skyhook_config::AppConfig;

pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if AppConfig::write_template(path)? {
        println!("Created {}.", path.display());
        println!("Fill in api_key (or set GEMINI_API_KEY) and run `skyhook` to start chatting.");
    } else {
        println!(
            "Config already exists at {}; leaving it untouched.",
            path.display()
        );
    }
    Ok(())
}
