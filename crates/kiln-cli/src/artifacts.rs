use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use kiln::compiler::{BuildDescription, Output};
use kiln::ir::IrNode;

use crate::error::CliError;

const DEFAULT_DEVICE: &str = "device";

/// The statement stream as written to `ir.json`.
#[derive(Serialize)]
struct IrFile<'a> {
    device: Option<&'a str>,
    target: &'static str,
    nodes: &'a [IrNode],
}

/// Returns the directory receiving the artifacts of `output`.
pub(crate) fn output_dir(out: Option<&Path>, output: &Output) -> PathBuf {
    match out {
        Some(out) => out.to_path_buf(),
        None => Path::new("build").join(output.device_name.as_deref().unwrap_or(DEFAULT_DEVICE)),
    }
}

fn to_json<T: Serialize>(name: &'static str, value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|source| CliError::Json { name, source })
}

fn write(dir: &Path, name: &'static str, contents: &str) -> Result<(), CliError> {
    let path = dir.join(name);
    fs::write(&path, contents).map_err(|error| CliError::io(&path, error))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Writes `ir.json` and `manifest.json` into `dir`.
///
/// Both artifacts are serialized before anything touches the disk.
pub(crate) fn write_artifacts(
    dir: &Path,
    output: &Output,
    description: &BuildDescription<'_>,
) -> Result<(), CliError> {
    let ir = to_json(
        "ir.json",
        &IrFile {
            device: output.device_name.as_deref(),
            target: description.target,
            nodes: &output.ir,
        },
    )?;
    let manifest = to_json("manifest.json", description)?;

    fs::create_dir_all(dir).map_err(|error| CliError::io(dir, error))?;
    write(dir, "ir.json", &ir)?;
    write(dir, "manifest.json", &manifest)?;
    info!("Artifacts written to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use kiln::compiler::Compiler;
    use serial_test::serial;

    use super::{output_dir, write_artifacts};

    const DOCUMENT: &str = "esphome:\n  name: porch\ni2c:\n  id: bus\nsensor:\n  - platform: bmp280\n    temperature:\n      name: Porch temperature\n";

    #[test]
    fn default_directory() {
        let registry = kiln_components::registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();
        let output = compiler.compile_str(DOCUMENT).unwrap();

        assert_eq!(output_dir(None, &output), Path::new("build").join("porch"));
        assert_eq!(
            output_dir(Some(Path::new("out")), &output),
            Path::new("out")
        );
    }

    #[test]
    #[serial]
    fn writes_both_artifacts() {
        let registry = kiln_components::registry().unwrap();
        let compiler = Compiler::new(&registry, "esp32-arduino").unwrap();
        let output = compiler.compile_str(DOCUMENT).unwrap();
        let dir = std::env::temp_dir().join("kiln-artifacts");
        let _ = std::fs::remove_dir_all(&dir);

        write_artifacts(&dir, &output, &compiler.describe(&output)).unwrap();

        let ir: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("ir.json")).unwrap()).unwrap();
        assert_eq!(ir["device"], "porch");
        assert_eq!(ir["target"], "esp32-arduino");
        assert_eq!(ir["nodes"].as_array().unwrap().len(), output.ir.len());

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("manifest.json")).unwrap())
                .unwrap();
        assert_eq!(manifest["platform"], "esp32");
        assert_eq!(manifest["framework"], "arduino");
        assert!(manifest["defines"].get("USE_SENSOR").is_some());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
