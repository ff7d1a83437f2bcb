use std::fs;
use std::path::Path;

use crate::pipeline::PipelineInput;

const LEDGER_EXTENSIONS: [&str; 3] = ["xls", "xlsx", "ods"];
const PAYMENT_EXTENSIONS: [&str; 1] = ["csv"];

/// Sorts the regular files directly inside `dir` into ledger and payment
/// exports by extension, case-insensitively. Each list is ordered by file name.
pub fn discover(dir: &Path) -> std::io::Result<PipelineInput> {
    let mut input = PipelineInput::default();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
        else {
            continue;
        };
        if LEDGER_EXTENSIONS.contains(&ext.as_str()) {
            input.ledger_files.push(path);
        } else if PAYMENT_EXTENSIONS.contains(&ext.as_str()) {
            input.payment_files.push(path);
        }
    }
    input.ledger_files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    input.payment_files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(paths: &[std::path::PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn splits_by_extension_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "movimenti-2024-02.xls",
            "movimenti-2024-01.XLSX",
            "paypal-marzo.CSV",
            "paypal-febbraio.csv",
            "estratto.ods",
            "note.txt",
            "README",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("bepp_export")).unwrap();
        fs::write(dir.path().join("bepp_export").join("BEPP.csv"), b"").unwrap();

        let input = discover(dir.path()).unwrap();
        assert_eq!(
            names(&input.ledger_files),
            vec!["estratto.ods", "movimenti-2024-01.XLSX", "movimenti-2024-02.xls"]
        );
        assert_eq!(
            names(&input.payment_files),
            vec!["paypal-febbraio.csv", "paypal-marzo.CSV"]
        );
    }

    #[test]
    fn empty_directory_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = discover(dir.path()).unwrap();
        assert!(input.ledger_files.is_empty());
        assert!(input.payment_files.is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(discover(Path::new("/no/such/dir")).is_err());
    }
}
