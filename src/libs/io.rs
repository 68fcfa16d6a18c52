use crate::libs::error::{GofmError, Result};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Open `input` for buffered reading. `stdin` reads standard input; files
/// ending in `.gz` are decompressed on the fly.
///
/// ```
/// use std::io::BufRead;
/// let reader = gofm::reader("tests/data/toy.obo").unwrap();
/// assert!(reader.lines().count() > 10);
///
/// assert!(gofm::reader("tests/data/no_such_file").is_err());
/// ```
pub fn reader(input: &str) -> Result<Box<dyn BufRead>> {
    let reader: Box<dyn BufRead> = if input == "stdin" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let path = Path::new(input);
        if !path.is_file() {
            return Err(GofmError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        let file = std::fs::File::open(path)?;

        if path.extension() == Some(std::ffi::OsStr::new("gz")) {
            Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        }
    };

    Ok(reader)
}

/// Open `output` for buffered writing. `stdout` writes to the screen.
pub fn writer(output: &str) -> Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = if output == "stdout" {
        Box::new(BufWriter::new(std::io::stdout()))
    } else {
        Box::new(BufWriter::new(std::fs::File::create(output)?))
    };

    Ok(writer)
}

/// Fail with `MissingInput` unless `path` is an existing file.
pub fn require_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.is_file() {
        Ok(())
    } else {
        Err(GofmError::MissingInput {
            path: path.to_path_buf(),
        })
    }
}

/// Serialize `value` into a bincode file.
pub fn save_bincode<T: serde::Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = BufWriter::new(std::fs::File::create(path)?);
    bincode::serialize_into(file, value).map_err(|e| GofmError::Parse {
        path: path.to_path_buf(),
        line: 0,
        message: e.to_string(),
    })
}

/// Load a value previously written by [`save_bincode`].
pub fn load_bincode<T: serde::de::DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    require_file(path)?;
    let file = BufReader::new(std::fs::File::open(path)?);
    bincode::deserialize_from(file).map_err(|e| GofmError::Parse {
        path: path.to_path_buf(),
        line: 0,
        message: e.to_string(),
    })
}
