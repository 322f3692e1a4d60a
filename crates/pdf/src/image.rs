//! PNG annotations as image XObjects.

use image::ImageFormat;
use lopdf::{dictionary, Document, ObjectId, Stream};

use crate::types::{FlattenError, Result};

/// Decode `png` and add it to `doc` as an RGB image XObject.
///
/// Transparency is carried in a DeviceGray soft mask, which is only attached
/// when some pixel is not fully opaque.
pub fn embed_png(doc: &mut Document, png: &[u8]) -> Result<ObjectId> {
    match image::guess_format(png) {
        Ok(ImageFormat::Png) => {}
        _ => return Err(FlattenError::NotPng),
    }
    let img = image::load_from_memory_with_format(png, ImageFormat::Png)?.to_rgba8();
    let (width, height) = img.dimensions();

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in img.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
    }

    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };

    if alpha.iter().any(|&a| a != 255) {
        let mut smask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        );
        smask.compress().ok();
        let smask_id = doc.add_object(smask);
        image_dict.set("SMask", smask_id);
    }

    let mut stream = Stream::new(image_dict, rgb);
    stream.compress().ok();
    let id = doc.add_object(stream);
    log::debug!("[Flatten] embedded {}x{} PNG as {:?}", width, height, id);
    Ok(id)
}
