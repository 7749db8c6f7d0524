//! Extension icon URL builder.
//!
//! Turns an SVG file into a link for the icon.ray.so generator with a fixed
//! style preset. No request is made; the caller opens the URL.

use crate::error::{Error, Result};
use std::path::Path;

const ICON_URL_PREFIX: &str = "https://icon.ray.so/?fileName=extension_icon&icon=undefined&backgroundRadius=128&backgroundStrokeSize=0&backgroundStrokeColor=%23FFFFFF&backgroundRadialGlare=false&backgroundNoiseTexture=false&backgroundNoiseTextureOpacity=25&backgroundStrokeOpacity=100&iconColor=%23FFFFFF&iconSize=352&selectedPresetIndex=9&customSvg=";
const ICON_URL_SUFFIX: &str = "&backgroundFillType=Linear&backgroundStartColor=%23DD1818&backgroundEndColor=%23380202&backgroundAngle=135";

/// Build the icon URL for already-loaded SVG markup.
pub fn svg_data_to_url(svg: &str) -> String {
    format!("{}{}{}", ICON_URL_PREFIX, urlencoding::encode(svg), ICON_URL_SUFFIX)
}

/// Read an SVG file and build its icon URL.
pub fn svg_to_url(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let svg = std::fs::read_to_string(path).map_err(|e| {
        Error::from(e)
            .with_operation("icon::svg_to_url")
            .with_context("path", path.display().to_string())
    })?;
    Ok(svg_data_to_url(&svg))
}
