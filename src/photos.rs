use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use crate::document::{Document, Row, Style, Table};
use crate::errors::{AppError, AppResult};
use crate::models::{Photo, TransportUnit};

/// Photos per grid table: two rows of two.
pub const PHOTOS_PER_TABLE: usize = 4;

// ==============================================================================
// PHOTO GRID
// ==============================================================================

/// Appends a landscape section holding every unit's photos, four per table,
/// each table followed by a page break. Returns the number of tables added.
pub fn add_photo_tables<'u, D, I>(doc: &mut D, units: I, template: &D::Table) -> AppResult<usize>
where
    D: Document,
    I: IntoIterator<Item = &'u TransportUnit>,
{
    let ratio = frame_ratio(template)?;
    doc.add_section(true);

    let mut tables = 0;
    for unit in units {
        doc.append_paragraph(&unit.number, &Style::default());
        let photos: Vec<&Photo> = unit.photos.iter().filter(|p| !p.is_empty()).collect();
        for chunk in photos.chunks(PHOTOS_PER_TABLE) {
            let mut table = template.clone();
            fill_photo_table::<D>(&mut table, chunk, ratio)?;
            doc.append_table(table);
            doc.add_page_break();
            tables += 1;
        }
        debug!(unit = %unit.number, photos = photos.len(), "Photos inserted");
    }
    Ok(tables)
}

/// Width of the first column over the height of the first row.
fn frame_ratio<T: Table>(template: &T) -> AppResult<f64> {
    let width = template.columns().first().map(|column| column.width);
    let height = template.rows().first().map(Row::height);
    match (width, height) {
        (Some(width), Some(height)) if height > 0.0 => Ok(width / height),
        _ => Err(AppError::TemplateCorrupted(
            "photos table template has no usable frame".to_string(),
        )),
    }
}

/// Places photos left to right, top to bottom into the first two rows.
fn fill_photo_table<D: Document>(table: &mut D::Table, photos: &[&Photo], ratio: f64) -> AppResult<()> {
    let slots: Vec<(usize, usize)> = (0..2)
        .flat_map(|row| (0..table.row_cells(row).len()).map(move |cell| (row, cell)))
        .collect();
    if slots.len() < PHOTOS_PER_TABLE {
        return Err(AppError::TemplateCorrupted(
            "photos table template needs two rows of two cells".to_string(),
        ));
    }

    for (photo, (row, cell)) in photos.iter().zip(slots) {
        let picture = prepare_photo(photo, ratio)?;
        let height = table.rows()[row].height();
        let width = table.column_width(cell).unwrap_or_default();
        if let Some(cells) = table.row_cells_mut(row) {
            D::insert_picture_into_cell(&mut cells[cell], &picture, height, width);
        }
    }
    Ok(())
}

/// Undoes the stored rotation, stretches to the frame ratio and re-encodes as PNG.
pub fn prepare_photo(photo: &Photo, ratio: f64) -> AppResult<Vec<u8>> {
    let image = image::load_from_memory(&photo.file)?;
    let image = undo_rotation(image, photo.rotation);

    let height = image.height();
    let width = ((height as f64) * ratio).round().max(1.0) as u32;
    let image = image.resize_exact(width, height, FilterType::Lanczos3);

    let mut png_bytes: Vec<u8> = Vec::new();
    image.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;
    Ok(png_bytes)
}

/// Turns the image counter-clockwise by `360 - rotation` degrees.
fn undo_rotation(image: DynamicImage, rotation: i32) -> DynamicImage {
    match (360 - rotation).rem_euclid(360) {
        0 => image,
        90 => image.rotate270(),
        180 => image.rotate180(),
        270 => image.rotate90(),
        angle => rotate_expanded(&image, f64::from(angle)),
    }
}

/// Counter-clockwise rotation about the centre on a canvas grown to fit the
/// whole image. Uncovered corners stay transparent.
fn rotate_expanded(image: &DynamicImage, degrees: f64) -> DynamicImage {
    let source = image.to_rgba8();
    let (w, h) = (f64::from(source.width()), f64::from(source.height()));
    let (sin, cos) = degrees.to_radians().sin_cos();
    let width = (w * cos.abs() + h * sin.abs()).round().max(1.0) as u32;
    let height = (w * sin.abs() + h * cos.abs()).round().max(1.0) as u32;

    let rotated = RgbaImage::from_fn(width, height, |x, y| {
        let dx = f64::from(x) + 0.5 - f64::from(width) / 2.0;
        let dy = f64::from(y) + 0.5 - f64::from(height) / 2.0;
        let sx = dx * cos - dy * sin + w / 2.0;
        let sy = dx * sin + dy * cos + h / 2.0;
        if (0.0..w).contains(&sx) && (0.0..h).contains(&sy) {
            *source.get_pixel(sx as u32, sy as u32)
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    DynamicImage::ImageRgba8(rotated)
}
