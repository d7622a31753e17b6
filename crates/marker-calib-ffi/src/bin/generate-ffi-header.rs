use std::env;
use std::path::PathBuf;

fn main() {
    let crate_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let out = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| crate_dir.join("include").join("marker_calib.h"));

    let config = cbindgen::Config {
        language: cbindgen::Language::C,
        include_guard: Some("MARKER_CALIB_H".to_string()),
        cpp_compat: true,
        ..cbindgen::Config::default()
    };

    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            if let Some(dir) = out.parent() {
                if let Err(err) = std::fs::create_dir_all(dir) {
                    eprintln!("failed to create {}: {err}", dir.display());
                    std::process::exit(1);
                }
            }
            bindings.write_to_file(&out);
            println!("wrote {}", out.display());
        }
        Err(err) => {
            eprintln!("failed to generate header: {err}");
            std::process::exit(1);
        }
    }
}
