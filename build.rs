use std::env;
use std::error::Error;
use std::fs::{self, File};
use std::io::prelude::*;
use std::path::Path;

const LUTS: [&str; 5] = ["lut1", "lut2", "lut3", "lut4", "lut5"];

fn write_luts() -> Result<(), Box<dyn Error>> {
    let out_dir = env::var_os("OUT_DIR").ok_or("OUT_DIR not set")?;
    let dest_path = Path::new(&out_dir).join("luts.rs");
    let mut file = File::create(dest_path)?;

    for name in LUTS {
        let path = Path::new("luts").join(name).with_extension("json");
        println!("cargo:rerun-if-changed={}", path.display());
        let rows: Vec<Vec<i8>> = serde_json::from_str(&fs::read_to_string(&path)?)?;
        let width = rows.first().map(Vec::len).unwrap_or_default();
        if width == 0 || rows.iter().any(|r| r.len() != width) {
            return Err(format!("{}: empty or ragged table", path.display()).into());
        }
        if rows.iter().flatten().any(|s| !(-1..=1).contains(s)) {
            return Err(format!("{}: symbols must be -1, 0, or 1", path.display()).into());
        }

        writeln!(
            file,
            "pub(crate) const {}: &[&[i8]] = &[",
            name.to_uppercase()
        )?;
        for row in rows.iter() {
            write!(file, "    &[")?;
            for s in row.iter() {
                write!(file, "{}, ", s)?;
            }
            writeln!(file, "],")?;
        }
        writeln!(file, "];")?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    write_luts()?;
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
