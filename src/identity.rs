//! Identidad de programas on-chain.
//!
//! El identificador de un programa es la clave pública de su par de
//! llaves, codificada en base58. Este módulo solo consulta llaves ya
//! existentes; generarlas es tarea de herramientas externas.

use log::{debug, info, warn};
use std::{fs, io, path::PathBuf};

use thiserror::Error;

/// Alfabeto base58 de Bitcoin, sin `0`, `O`, `I` ni `l`.
const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Longitud de un archivo de par de llaves: secreta y luego pública.
const KEYPAIR_LEN: usize = 64;
const PUBLIC_KEY_LEN: usize = 32;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Failed to read keypair file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Keypair file {} is not a JSON byte array", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Keypair file {} holds {len} bytes, expected {}", .path.display(), KEYPAIR_LEN)]
    BadLength { path: PathBuf, len: usize },
}

/// Fuente de claves públicas por nombre de programa.
///
/// Dos consultas por el mismo nombre deben producir la misma clave.
pub trait KeyProvider {
    fn public_key(&self, program: &str) -> Result<Option<String>, IdentityError>;
}

/// Proveedor que nunca conoce una clave.
pub struct NoKeys;

impl KeyProvider for NoKeys {
    fn public_key(&self, _program: &str) -> Result<Option<String>, IdentityError> {
        Ok(None)
    }
}

/// Directorio con archivos `<programa>-keypair.json`.
pub struct KeypairDirectory {
    root: PathBuf,
}

impl KeypairDirectory {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        KeypairDirectory { root: root.into() }
    }

    pub fn path_for(&self, program: &str) -> PathBuf {
        self.root.join(format!("{}-keypair.json", program))
    }
}

impl KeyProvider for KeypairDirectory {
    fn public_key(&self, program: &str) -> Result<Option<String>, IdentityError> {
        let path = self.path_for(program);

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                info!("No keypair for program `{}` at {}", program, path.display());
                return Ok(None);
            }

            Err(source) => return Err(IdentityError::Io { path, source }),
        };

        let bytes = match serde_json::from_str::<Vec<u8>>(&text) {
            Ok(bytes) => bytes,
            Err(source) => return Err(IdentityError::Malformed { path, source }),
        };

        if bytes.len() != KEYPAIR_LEN {
            let len = bytes.len();
            return Err(IdentityError::BadLength { path, len });
        }

        let key = encode(&bytes[KEYPAIR_LEN - PUBLIC_KEY_LEN..]);
        debug!("Program `{}` has public key {} ({})", program, key, path.display());

        Ok(Some(key))
    }
}

/// Codifica bytes en base58. Cada byte cero inicial se vuelve un `1`.
pub fn encode(bytes: &[u8]) -> String {
    let zeros = bytes.iter().take_while(|&&byte| byte == 0).count();

    // Dígitos en base 58, del menos significativo al más significativo
    let mut digits: Vec<u8> = Vec::with_capacity(bytes.len() * 138 / 100 + 1);
    for &byte in &bytes[zeros..] {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }

        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let leading = std::iter::repeat('1').take(zeros);
    let rest = digits.iter().rev().map(|&digit| ALPHABET[digit as usize] as char);

    leading.chain(rest).collect()
}

/// Revisa que un identificador tenga forma de clave base58.
///
/// Un identificador sospechoso se reporta pero no se rechaza, ya que
/// la herramienta que lo consume tiene la última palabra.
pub fn validate_program_id(id: &str) -> bool {
    let length_ok = (32..=44).contains(&id.len());
    let invalid = id.chars().find(|c| !c.is_ascii() || !ALPHABET.contains(&(*c as u8)));

    match (length_ok, invalid) {
        (true, None) => true,

        (false, _) => {
            warn!("Program id `{}` has {} characters, expected 32 to 44", id, id.len());
            false
        }

        (true, Some(c)) => {
            warn!("Program id `{}` contains `{}`, which is not a base58 digit", id, c);
            false
        }
    }
}
