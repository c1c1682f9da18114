#[cfg(test)]
mod test {

    use super::super::*;
    use bytes::BytesMut;
    use random_fast_rng::FastRng;
    use std::io;
    use vault_keeper_test_util::{random_bytes, random_fill_text, zeroed_bytes};

    const TEST_BUF_LEN: usize = 500;

    #[test]
    fn compress_uncompress() -> Result<(), io::Error> {
        let comp_in = random_bytes(TEST_BUF_LEN);
        let data_len = comp_in.len();

        let mut comp_dest = BytesMut::new();

        let _ = Compressor::new().from_buf(&comp_in, &mut comp_dest)?;

        let uc = Uncompressor::new();
        let compressed_size = comp_dest.len();

        // use small initial capacity to test auto-grow
        let mut decomp = BytesMut::with_capacity(5);
        let _ = uc.from_slice(&comp_dest.freeze(), &mut decomp)?;

        assert_eq!(comp_in.as_ref(), decomp.freeze().as_ref(), "data same after decomp");

        println!(
            "compress ratio: {}",
            1.0 - (100.0 * compressed_size as f64) / (data_len as f64)
        );
        Ok(())
    }

    #[test]
    fn empty_input() -> Result<(), io::Error> {
        let packed = compress(&[])?;
        assert!(!packed.is_empty(), "gzip framing present");
        assert!(decompress(&packed)?.is_empty());
        Ok(())
    }

    #[test]
    fn text_shrinks() -> Result<(), io::Error> {
        const BUF_LEN: usize = 16 * 1024;
        let mut rng = FastRng::new();
        let mut text = zeroed_bytes(BUF_LEN);
        random_fill_text(&mut rng, &mut text);

        let packed = compress(&text)?;
        assert!(packed.len() < BUF_LEN, "text should compress");
        assert_eq!(decompress(&packed)?.as_ref(), text.as_ref());
        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decompress(b"definitely not gzip").is_err());
    }
}
