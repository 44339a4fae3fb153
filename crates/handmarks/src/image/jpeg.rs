use std::{
    env::{self, VarError},
    sync::OnceLock,
};

use anyhow::{anyhow, bail};
use image::ImageBuffer;

use super::Image;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JpegBackend {
    JpegDecoder,
    ZuneJpeg,
}

const DEFAULT_BACKEND: JpegBackend = JpegBackend::JpegDecoder;

const BACKEND_VAR: &str = "HANDMARKS_JPEG_BACKEND";

fn parse_backend(value: Result<String, VarError>) -> anyhow::Result<JpegBackend> {
    match value {
        Ok(v) if v == "jpeg-decoder" => Ok(JpegBackend::JpegDecoder),
        Ok(v) if v == "zune-jpeg" => Ok(JpegBackend::ZuneJpeg),
        Ok(v) => bail!("invalid value set for `{BACKEND_VAR}` variable: '{v}'"),
        Err(VarError::NotPresent) => Ok(DEFAULT_BACKEND),
        Err(VarError::NotUnicode(s)) => bail!(
            "invalid value set for `{BACKEND_VAR}` variable: {}",
            s.to_string_lossy()
        ),
    }
}

fn backend() -> anyhow::Result<JpegBackend> {
    static BACKEND: OnceLock<Result<JpegBackend, String>> = OnceLock::new();
    BACKEND
        .get_or_init(|| {
            let backend = parse_backend(env::var(BACKEND_VAR)).map_err(|e| e.to_string());
            if let Ok(backend) = &backend {
                log::debug!("using JPEG decode backend: {:?}", backend);
            }
            backend
        })
        .clone()
        .map_err(anyhow::Error::msg)
}

/// Fails if the backend selected by the environment is unknown.
///
/// Decoding reports the same error, but per frame. Capture checks it once up front instead.
pub(crate) fn check_backend() -> anyhow::Result<()> {
    backend().map(drop)
}

pub(super) fn decode_jpeg(data: &[u8]) -> anyhow::Result<Image> {
    let buf = match backend()? {
        JpegBackend::JpegDecoder => {
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8()
        }
        JpegBackend::ZuneJpeg => {
            use zune_jpeg::zune_core::colorspace::ColorSpace;
            use zune_jpeg::zune_core::options::DecoderOptions;

            let mut decomp = zune_jpeg::JpegDecoder::new_with_options(
                DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGBA),
                data,
            );
            decomp.decode_headers()?;
            let colorspace = decomp
                .get_output_colorspace()
                .ok_or_else(|| anyhow!("JPEG headers did not specify a colorspace"))?;
            if colorspace != ColorSpace::RGBA {
                bail!("unsupported colorspace {colorspace:?} (expected RGBA)");
            }

            let size = decomp
                .output_buffer_size()
                .ok_or_else(|| anyhow!("JPEG image size overflows"))?;
            let mut buf = vec![0; size];
            decomp.decode_into(&mut buf)?;
            let (width, height) = decomp
                .dimensions()
                .ok_or_else(|| anyhow!("JPEG headers did not specify dimensions"))?;
            ImageBuffer::from_raw(width.into(), height.into(), buf)
                .ok_or_else(|| anyhow!("decoded JPEG does not match its {width}x{height} size"))?
        }
    };

    Ok(Image { buf })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_names() {
        assert_eq!(
            parse_backend(Ok("zune-jpeg".into())).unwrap(),
            JpegBackend::ZuneJpeg
        );
        assert_eq!(
            parse_backend(Ok("jpeg-decoder".into())).unwrap(),
            JpegBackend::JpegDecoder
        );
        assert_eq!(
            parse_backend(Err(VarError::NotPresent)).unwrap(),
            DEFAULT_BACKEND
        );
        assert!(parse_backend(Ok("mozjpeg".into())).is_err());
    }

    #[test]
    fn names_the_variable() {
        let err = parse_backend(Ok("turbo".into())).unwrap_err();
        assert!(err.to_string().contains(BACKEND_VAR), "{err}");
        assert!(err.to_string().contains("turbo"), "{err}");
    }

    #[test]
    fn check_matches_environment() {
        let expected = parse_backend(env::var(BACKEND_VAR));
        assert_eq!(check_backend().is_ok(), expected.is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_jpeg(b"definitely not a jpeg").is_err());
    }
}
