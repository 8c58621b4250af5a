//! Bytecode loading.

use super::error::TranslateResult;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read a bytecode file into memory.
///
/// The file has no header and no length prefix; every byte belongs to the
/// program. The handle is closed before returning on every path.
pub fn read_bytecode<P: AsRef<Path>>(path: P) -> TranslateResult<Vec<u8>> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    let mut code = Vec::new();
    file.read_to_end(&mut code)?;

    log::debug!("Loaded {} bytes of bytecode from {}", code.len(), path.display());
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TranslateError;

    #[test]
    fn test_missing_file_is_io_error() {
        let result = read_bytecode("/nonexistent/program.bc");
        assert!(matches!(result, Err(TranslateError::Io(_))));
    }

    #[test]
    fn test_reads_every_byte() {
        let path = std::env::temp_dir().join(format!("bcir_loader_{}.bc", std::process::id()));
        std::fs::write(&path, [0x10, 0x00, 0x05, 0x62]).unwrap();

        let code = read_bytecode(&path).unwrap();
        assert_eq!(code, vec![0x10, 0x00, 0x05, 0x62]);

        std::fs::remove_file(&path).unwrap();
    }
}
