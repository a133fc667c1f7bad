use std::env;
use std::fs;
use std::path::PathBuf;

const MANIFEST: &str = "schema_manifest.json";
const MIGRATIONS_DIR: &str = "src/migration";

fn main() {
    println!("cargo:rerun-if-changed={MANIFEST}");
    println!("cargo:rerun-if-changed={MIGRATIONS_DIR}");
    let manifest = fs::read_to_string(MANIFEST).expect("read schema manifest");

    // Every migration step must be listed in the embedded manifest.
    let entries = fs::read_dir(MIGRATIONS_DIR).expect("read migration dir");
    for entry in entries {
        let path = entry.expect("migration dir entry").path();
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if stem.starts_with('m') && stem.as_bytes().get(1).is_some_and(u8::is_ascii_digit) {
            assert!(
                manifest.contains(&format!("\"{stem}\"")),
                "{MANIFEST} does not list migration {stem}"
            );
        }
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR"));
    fs::write(out_dir.join(MANIFEST), manifest).expect("write schema manifest");
}
