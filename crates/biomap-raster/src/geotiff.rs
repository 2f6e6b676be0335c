//! Single-band GeoTIFF backend built on the `tiff` decoder.
//!
//! The file is reopened for every read call so concurrent readers never
//! share a decoder. Decoded strips/tiles ("chunks") are kept in a shared LRU.

use std::fs::File;
use std::io::BufReader;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use biomap_core::error::{BiomapError, Result};
use biomap_core::models::{sample_to_class, GeoTransform, PixelWindow, RasterMetadata, RasterWindow};
use biomap_core::ports::RasterBackend;
use lru::LruCache;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType;

const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Geographic CRS codes whose axes are plain lon/lat degrees
const GEOGRAPHIC_EPSG: &[u32] = &[4326, 4674, 4618];

type TiffReader = Decoder<BufReader<File>>;

#[derive(Debug)]
struct DecodedChunk {
    width: usize,
    cells: Vec<Option<u16>>,
}

impl DecodedChunk {
    fn get(&self, col: usize, row: usize) -> Option<u16> {
        self.cells.get(row * self.width + col).copied().flatten()
    }
}

#[derive(Debug, Clone, Copy)]
struct ChunkLayout {
    chunk_width: usize,
    chunk_height: usize,
    chunks_across: usize,
}

impl ChunkLayout {
    /// Chunk index and in-chunk offset of an absolute pixel
    fn locate(&self, col: usize, row: usize) -> (u32, usize, usize) {
        let index = (row / self.chunk_height) * self.chunks_across + col / self.chunk_width;
        (index as u32, col % self.chunk_width, row % self.chunk_height)
    }
}

pub struct GeoTiffRaster {
    path: PathBuf,
    metadata: RasterMetadata,
    layout: ChunkLayout,
    file_size: u64,
    cache: Option<Mutex<LruCache<u32, Arc<DecodedChunk>>>>,
}

impl std::fmt::Debug for GeoTiffRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoTiffRaster")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl GeoTiffRaster {
    /// Open and validate a georeferenced single-band raster.
    ///
    /// `chunk_cache_capacity` of zero disables the decoded-chunk cache.
    pub fn open(path: impl AsRef<Path>, chunk_cache_capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file_size = std::fs::metadata(&path)
            .map_err(|e| BiomapError::unavailable("land-use raster", format!("{}: {}", path.display(), e)))?
            .len();

        let mut decoder = open_decoder(&path)?;
        let format_err = |message: String| BiomapError::Format {
            format: "GeoTIFF".to_string(),
            path: path.clone(),
            message,
        };

        let (width, height) = decoder.dimensions().map_err(|e| format_err(e.to_string()))?;
        match decoder.colortype().map_err(|e| format_err(e.to_string()))? {
            ColorType::Gray(_) => {}
            other => return Err(format_err(format!("expected a single band, found {:?}", other))),
        }

        let transform = read_transform(&mut decoder).ok_or_else(|| {
            format_err("missing ModelTransformation or ModelPixelScale/ModelTiepoint tags".to_string())
        })?;

        let epsg = match read_epsg(&mut decoder) {
            Some((code, true)) => {
                return Err(format_err(format!(
                    "projected CRS EPSG:{} is not supported, expected geographic coordinates",
                    code
                )))
            }
            Some((code, false)) if !GEOGRAPHIC_EPSG.contains(&code) => {
                tracing::warn!(epsg = code, "Raster CRS treated as lon/lat degrees");
                Some(code)
            }
            Some((code, false)) => Some(code),
            None => None,
        };

        let nodata = decoder
            .get_tag_ascii_string(Tag::GdalNodata)
            .ok()
            .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse::<f64>().ok());

        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        let layout = ChunkLayout {
            chunk_width: chunk_width.max(1) as usize,
            chunk_height: chunk_height.max(1) as usize,
            chunks_across: (width as usize).div_ceil(chunk_width.max(1) as usize),
        };

        let metadata = RasterMetadata {
            width: width as usize,
            height: height as usize,
            transform,
            epsg,
            nodata,
        };

        tracing::debug!(
            path = %path.display(),
            width,
            height,
            chunk_width,
            chunk_height,
            nodata = ?nodata,
            "GeoTIFF metadata read"
        );

        Ok(Self {
            path,
            metadata,
            layout,
            file_size,
            cache: NonZeroUsize::new(chunk_cache_capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check(&self, window: &PixelWindow) -> Result<()> {
        if window.col_off + window.width > self.metadata.width
            || window.row_off + window.height > self.metadata.height
        {
            return Err(BiomapError::Raster {
                reason: format!(
                    "window {:?} exceeds raster {}x{}",
                    window, self.metadata.width, self.metadata.height
                ),
            });
        }
        Ok(())
    }

    fn cached(&self, index: u32) -> Option<Arc<DecodedChunk>> {
        let cache = self.cache.as_ref()?;
        match cache.lock() {
            Ok(mut guard) => guard.get(&index).cloned(),
            Err(_) => {
                tracing::warn!("Raster chunk cache lock poisoned, decoding directly");
                None
            }
        }
    }

    fn remember(&self, index: u32, chunk: Arc<DecodedChunk>) {
        if let Some(cache) = &self.cache {
            if let Ok(mut guard) = cache.lock() {
                guard.put(index, chunk);
            }
        }
    }
}

/// Per-call chunk access; opens the file only on the first cache miss.
struct ChunkReader<'a> {
    raster: &'a GeoTiffRaster,
    decoder: Option<TiffReader>,
}

impl<'a> ChunkReader<'a> {
    fn new(raster: &'a GeoTiffRaster) -> Self {
        Self {
            raster,
            decoder: None,
        }
    }

    fn chunk(&mut self, index: u32) -> Result<Arc<DecodedChunk>> {
        if let Some(chunk) = self.raster.cached(index) {
            return Ok(chunk);
        }

        let decoder = match self.decoder.take() {
            Some(d) => d,
            None => open_decoder(&self.raster.path)?,
        };
        let decoder = self.decoder.insert(decoder);

        let (width, _height) = decoder.chunk_data_dimensions(index);
        let data = decoder.read_chunk(index).map_err(|e| BiomapError::Raster {
            reason: format!("chunk {}: {}", index, e),
        })?;
        let chunk = Arc::new(DecodedChunk {
            width: width as usize,
            cells: decode_cells(data, self.raster.metadata.nodata)?,
        });

        self.raster.remember(index, Arc::clone(&chunk));
        Ok(chunk)
    }
}

impl RasterBackend for GeoTiffRaster {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn is_available(&self) -> bool {
        true
    }

    fn metadata(&self) -> Result<RasterMetadata> {
        Ok(self.metadata.clone())
    }

    fn read_window(&self, window: &PixelWindow) -> Result<RasterWindow> {
        self.check(window)?;
        let mut cells = vec![None; window.len()];
        if window.is_empty() {
            return Ok(RasterWindow::new(*window, cells));
        }

        let layout = self.layout;
        let mut reader = ChunkReader::new(self);

        let first_chunk_row = window.row_off / layout.chunk_height;
        let last_chunk_row = (window.row_off + window.height - 1) / layout.chunk_height;
        let first_chunk_col = window.col_off / layout.chunk_width;
        let last_chunk_col = (window.col_off + window.width - 1) / layout.chunk_width;

        for chunk_row in first_chunk_row..=last_chunk_row {
            for chunk_col in first_chunk_col..=last_chunk_col {
                let index = (chunk_row * layout.chunks_across + chunk_col) as u32;
                let chunk = reader.chunk(index)?;

                // Overlap of this chunk with the window, absolute pixels
                let row_start = (chunk_row * layout.chunk_height).max(window.row_off);
                let row_end = ((chunk_row + 1) * layout.chunk_height).min(window.row_off + window.height);
                let col_start = (chunk_col * layout.chunk_width).max(window.col_off);
                let col_end = ((chunk_col + 1) * layout.chunk_width).min(window.col_off + window.width);

                for row in row_start..row_end {
                    let out = (row - window.row_off) * window.width;
                    for col in col_start..col_end {
                        cells[out + col - window.col_off] = chunk.get(
                            col - chunk_col * layout.chunk_width,
                            row - chunk_row * layout.chunk_height,
                        );
                    }
                }
            }
        }

        Ok(RasterWindow::new(*window, cells))
    }

    fn sample(&self, pixels: &[(usize, usize)]) -> Result<Vec<Option<u16>>> {
        let mut reader = ChunkReader::new(self);
        let mut last: Option<(u32, Arc<DecodedChunk>)> = None;
        let mut out = Vec::with_capacity(pixels.len());

        for &(col, row) in pixels {
            if col >= self.metadata.width || row >= self.metadata.height {
                out.push(None);
                continue;
            }
            let (index, local_col, local_row) = self.layout.locate(col, row);
            let chunk = match &last {
                Some((i, chunk)) if *i == index => Arc::clone(chunk),
                _ => {
                    let chunk = reader.chunk(index)?;
                    last = Some((index, Arc::clone(&chunk)));
                    chunk
                }
            };
            out.push(chunk.get(local_col, local_row));
        }
        Ok(out)
    }

    fn file_size_bytes(&self) -> Option<u64> {
        Some(self.file_size)
    }
}

fn open_decoder(path: &Path) -> Result<TiffReader> {
    let file = File::open(path)
        .map_err(|e| BiomapError::unavailable("land-use raster", format!("{}: {}", path.display(), e)))?;
    Decoder::new(BufReader::new(file)).map_err(|e| BiomapError::Format {
        format: "GeoTIFF".to_string(),
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn read_transform(decoder: &mut TiffReader) -> Option<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        if m.len() >= 8 {
            return Some(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }

    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    let (sx, sy) = (scale[0], scale[1]);
    Some(GeoTransform::north_up(x - i * sx, y + j * sy, sx, sy))
}

/// EPSG code from the GeoKey directory and whether it is a projected CRS.
fn read_epsg(decoder: &mut TiffReader) -> Option<(u32, bool)> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    parse_geo_keys(&keys)
}

fn parse_geo_keys(keys: &[u16]) -> Option<(u32, bool)> {
    let mut geographic = None;
    let mut projected = None;
    // Header is four shorts; each entry is (key, location, count, value)
    for entry in keys.get(4..)?.chunks_exact(4) {
        if entry[1] != 0 {
            continue;
        }
        match entry[0] {
            GEOGRAPHIC_TYPE_KEY => geographic = Some(entry[3] as u32),
            PROJECTED_CS_TYPE_KEY => projected = Some(entry[3] as u32),
            _ => {}
        }
    }
    projected.map(|p| (p, true)).or(geographic.map(|g| (g, false)))
}

fn decode_cells(data: DecodingResult, nodata: Option<f64>) -> Result<Vec<Option<u16>>> {
    fn map<T: Copy + Into<f64>>(values: &[T], nodata: Option<f64>) -> Vec<Option<u16>> {
        values.iter().map(|&v| sample_to_class(v.into(), nodata)).collect()
    }

    let cells = match data {
        DecodingResult::U8(v) => map(&v, nodata),
        DecodingResult::U16(v) => map(&v, nodata),
        DecodingResult::U32(v) => map(&v, nodata),
        DecodingResult::I8(v) => map(&v, nodata),
        DecodingResult::I16(v) => map(&v, nodata),
        DecodingResult::I32(v) => map(&v, nodata),
        DecodingResult::F32(v) => map(&v, nodata),
        DecodingResult::F64(v) => map(&v, nodata),
        DecodingResult::U64(v) => v.iter().map(|&x| sample_to_class(x as f64, nodata)).collect(),
        DecodingResult::I64(v) => v.iter().map(|&x| sample_to_class(x as f64, nodata)).collect(),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(BiomapError::Raster {
                reason: "unsupported sample format".to_string(),
            })
        }
    };
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tiff::encoder::{colortype, TiffEncoder};

    /// 8-bit GeoTIFF with 4-row strips, origin at (-48, -22), 0.01° pixels.
    fn write_fixture(dir: &TempDir, width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> PathBuf {
        let path = dir.path().join("landuse.tif");
        let data: Vec<u8> = (0..height).flat_map(|r| (0..width).map(move |c| (r, c))).map(|(r, c)| f(c, r)).collect();

        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        let mut image = encoder.new_image::<colortype::Gray8>(width, height).unwrap();
        image.encoder().write_tag(Tag::ModelPixelScaleTag, &[0.01f64, 0.01, 0.0][..]).unwrap();
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, -48.0, -22.0, 0.0][..])
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::GeoKeyDirectoryTag, &[1u16, 1, 0, 1, GEOGRAPHIC_TYPE_KEY, 0, 1, 4326][..])
            .unwrap();
        image.encoder().write_tag(Tag::GdalNodata, "255").unwrap();
        image.rows_per_strip(4).unwrap();
        image.write_data(&data).unwrap();
        path
    }

    #[test]
    fn test_metadata_from_tags() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, 20, 10, |_, _| 15);

        let raster = GeoTiffRaster::open(&path, 8).unwrap();
        let meta = raster.metadata().unwrap();

        assert_eq!((meta.width, meta.height), (20, 10));
        assert_eq!(meta.epsg, Some(4326));
        assert_eq!(meta.nodata, Some(255.0));
        let bounds = meta.bounds();
        assert!((bounds.west - -48.0).abs() < 1e-9);
        assert!((bounds.east - -47.8).abs() < 1e-9);
        assert!((bounds.south - -22.1).abs() < 1e-9);
        assert!(raster.file_size_bytes().unwrap() > 0);
    }

    #[test]
    fn test_window_spans_strips() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, 20, 10, |c, r| if c == 0 { 255 } else { (r * 20 + c) as u8 });

        let raster = GeoTiffRaster::open(&path, 8).unwrap();
        let window = raster.read_window(&PixelWindow::new(0, 2, 5, 6)).unwrap();

        assert_eq!(window.get(0, 0), None, "nodata column");
        assert_eq!(window.get(1, 0), Some(41));
        assert_eq!(window.get(4, 5), Some(7 * 20 + 4));
    }

    #[test]
    fn test_sample_matches_window_without_cache() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, 20, 10, |c, r| ((r + c) % 7) as u8);

        let raster = GeoTiffRaster::open(&path, 0).unwrap();
        let full = raster.read_window(&raster.metadata().unwrap().full_window()).unwrap();
        let positions = [(0, 0), (19, 9), (7, 3), (7, 4), (25, 1)];
        let samples = raster.sample(&positions).unwrap();

        for (i, &(col, row)) in positions.iter().enumerate() {
            assert_eq!(samples[i], full.get(col, row), "mismatch at {:?}", (col, row));
        }
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = GeoTiffRaster::open("/nonexistent/landuse.tif", 8).unwrap_err();
        assert!(matches!(err, BiomapError::ResourceUnavailable { .. }));
    }

    #[test]
    fn test_window_outside_grid() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, 8, 8, |_, _| 3);
        let raster = GeoTiffRaster::open(&path, 8).unwrap();
        assert!(raster.read_window(&PixelWindow::new(4, 4, 8, 1)).is_err());
    }

    #[test]
    fn test_parse_geo_keys() {
        assert_eq!(parse_geo_keys(&[1, 1, 0, 1, 2048, 0, 1, 4326]), Some((4326, false)));
        assert_eq!(
            parse_geo_keys(&[1, 1, 0, 2, 2048, 0, 1, 4674, 3072, 0, 1, 31983]),
            Some((31983, true))
        );
        assert_eq!(parse_geo_keys(&[1, 1, 0]), None);
    }
}
