mod compress;
pub use compress::{compress, decompress, Compressor, Uncompressor};

mod encoding;
pub use encoding::{FromBase64, ToBase64};

mod util;
pub use util::{getenv, getenv_default, unix_millis};

#[cfg(test)]
mod test_comp;
