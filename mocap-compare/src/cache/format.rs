//! Binary layout of cached grids.
//!
//! Every file starts with the magic `MVOX` and a little-endian `u32` version.
//! Version 2 follows with tagged sections (`u32` tag, `u64` byte length,
//! payload); readers skip tags they do not know. Version 1 files carry one
//! flat record instead. Cell arrays are stored as raw `f32`s in native byte
//! order.

use super::CacheError;
use crate::voxel::{GridLayout, ReferencePose, VoxelGrid};

pub const MAGIC: &[u8; 4] = b"MVOX";
pub const FORMAT_VERSION: u32 = 2;
const LEGACY_VERSION: u32 = 1;

const TAG_RESOLUTION: u32 = 1;
const TAG_CELLS: u32 = 2;
const TAG_REFERENCE: u32 = 3;
const TAG_SEGMENT_COUNT: u32 = 4;
const TAG_GRID: u32 = 5;

/// A decoded grid before it is placed on a layout.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRecord {
    pub resolution: usize,
    pub cells: Vec<f32>,
    pub reference: Option<ReferencePose>,
}

impl GridRecord {
    pub fn into_grid(self, layout: GridLayout) -> Result<VoxelGrid, CacheError> {
        if self.resolution != layout.resolution {
            return Err(CacheError::MetadataMismatch(format!(
                "grid resolution {} != {}",
                self.resolution, layout.resolution
            )));
        }
        VoxelGrid::from_cells(layout, self.cells, self.reference).ok_or_else(|| {
            CacheError::Malformed(format!("cell count does not match resolution {}", layout.resolution))
        })
    }
}

fn put_header(out: &mut Vec<u8>) {
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
}

fn put_section(out: &mut Vec<u8>, tag: u32, payload: &[u8]) {
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(payload);
}

fn grid_sections(grid: &VoxelGrid) -> Vec<u8> {
    let mut out = Vec::with_capacity(grid.cells().len() * 4 + 64);
    put_section(&mut out, TAG_RESOLUTION, &(grid.resolution() as u32).to_le_bytes());
    put_section(&mut out, TAG_CELLS, bytemuck::cast_slice(grid.cells()));
    if let Some(reference) = grid.reference() {
        put_section(&mut out, TAG_REFERENCE, bytemuck::cast_slice(&reference.to_array()));
    }
    out
}

pub fn encode_grid(grid: &VoxelGrid) -> Vec<u8> {
    let mut out = Vec::new();
    put_header(&mut out);
    out.extend_from_slice(&grid_sections(grid));
    out
}

pub fn encode_segments(grids: &[VoxelGrid]) -> Vec<u8> {
    let mut out = Vec::new();
    put_header(&mut out);
    put_section(&mut out, TAG_SEGMENT_COUNT, &(grids.len() as u32).to_le_bytes());
    for grid in grids {
        put_section(&mut out, TAG_GRID, &grid_sections(grid));
    }
    out
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CacheError> {
        let end = self.pos.checked_add(len).ok_or(CacheError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(CacheError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CacheError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CacheError> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, CacheError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, CacheError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f32s(&mut self, count: usize) -> Result<Vec<f32>, CacheError> {
        let len = count.checked_mul(4).ok_or(CacheError::Truncated)?;
        Ok(bytemuck::pod_collect_to_vec(self.take(len)?))
    }

    fn section(&mut self) -> Result<(u32, &'a [u8]), CacheError> {
        let tag = self.u32()?;
        let len = usize::try_from(self.u64()?).map_err(|_| CacheError::Truncated)?;
        Ok((tag, self.take(len)?))
    }
}

fn read_header(reader: &mut ByteReader<'_>) -> Result<u32, CacheError> {
    if reader.take(MAGIC.len()).map_err(|_| CacheError::BadMagic)? != MAGIC {
        return Err(CacheError::BadMagic);
    }
    match reader.u32()? {
        version @ (LEGACY_VERSION | FORMAT_VERSION) => Ok(version),
        other => Err(CacheError::UnsupportedVersion(other)),
    }
}

fn cell_count(resolution: usize) -> Result<usize, CacheError> {
    resolution
        .checked_mul(resolution)
        .and_then(|n| n.checked_mul(resolution))
        .ok_or_else(|| CacheError::Malformed(format!("resolution {resolution} too large")))
}

fn reference_from(values: &[f32]) -> Result<ReferencePose, CacheError> {
    let values: &[f32; 12] = values
        .try_into()
        .map_err(|_| CacheError::Malformed("reference pose needs 12 values".into()))?;
    Ok(ReferencePose::from_array(values))
}

fn decode_grid_sections(payload: &[u8]) -> Result<GridRecord, CacheError> {
    let mut reader = ByteReader::new(payload);
    let mut resolution = None;
    let mut cells = None;
    let mut reference = None;
    while !reader.is_empty() {
        let (tag, body) = reader.section()?;
        let mut body = ByteReader::new(body);
        match tag {
            TAG_RESOLUTION => resolution = Some(body.u32()? as usize),
            TAG_CELLS => cells = Some(body.f32s(body.bytes.len() / 4)?),
            TAG_REFERENCE => reference = Some(reference_from(&body.f32s(12)?)?),
            _ => {}
        }
    }

    let resolution = resolution.ok_or_else(|| CacheError::Malformed("missing resolution".into()))?;
    let cells = cells.ok_or_else(|| CacheError::Malformed("missing cells".into()))?;
    if cells.len() != cell_count(resolution)? {
        return Err(CacheError::Malformed(format!(
            "{} cells for resolution {resolution}",
            cells.len()
        )));
    }
    Ok(GridRecord {
        resolution,
        cells,
        reference,
    })
}

fn decode_legacy_grid(reader: &mut ByteReader<'_>) -> Result<GridRecord, CacheError> {
    let resolution = reader.u32()? as usize;
    let cells = reader.f32s(cell_count(resolution)?)?;
    let reference = match reader.u8()? {
        0 => None,
        _ => Some(reference_from(&reader.f32s(12)?)?),
    };
    Ok(GridRecord {
        resolution,
        cells,
        reference,
    })
}

pub fn decode_grid(bytes: &[u8]) -> Result<GridRecord, CacheError> {
    let mut reader = ByteReader::new(bytes);
    match read_header(&mut reader)? {
        LEGACY_VERSION => decode_legacy_grid(&mut reader),
        _ => decode_grid_sections(&bytes[reader.pos..]),
    }
}

pub fn decode_segments(bytes: &[u8]) -> Result<Vec<GridRecord>, CacheError> {
    let mut reader = ByteReader::new(bytes);
    if read_header(&mut reader)? == LEGACY_VERSION {
        let count = reader.u32()? as usize;
        return (0..count).map(|_| decode_legacy_grid(&mut reader)).collect();
    }

    let mut count = None;
    let mut grids = Vec::new();
    while !reader.is_empty() {
        let (tag, body) = reader.section()?;
        match tag {
            TAG_SEGMENT_COUNT => count = Some(ByteReader::new(body).u32()? as usize),
            TAG_GRID => grids.push(decode_grid_sections(body)?),
            _ => {}
        }
    }
    match count {
        Some(count) if count == grids.len() => Ok(grids),
        Some(count) => Err(CacheError::Malformed(format!(
            "expected {count} segment grids, found {}",
            grids.len()
        ))),
        None => Err(CacheError::Malformed("missing segment count".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat3, Vec3};
    use mocap_data::WorldBounds;

    fn grid() -> VoxelGrid {
        let layout = GridLayout::new(3, WorldBounds::new(Vec3::ZERO, Vec3::ONE));
        let cells = (0..27).map(|i| i as f32 * 0.5).collect();
        let reference = ReferencePose {
            root_position: Vec3::new(0.1, 0.2, 0.3),
            root_orientation: Mat3::from_rotation_z(0.4),
        };
        VoxelGrid::from_cells(layout, cells, Some(reference)).unwrap()
    }

    fn encode_legacy(grid: &VoxelGrid) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&LEGACY_VERSION.to_le_bytes());
        out.extend_from_slice(&(grid.resolution() as u32).to_le_bytes());
        out.extend_from_slice(bytemuck::cast_slice(grid.cells()));
        match grid.reference() {
            Some(reference) => {
                out.push(1);
                out.extend_from_slice(bytemuck::cast_slice(&reference.to_array()));
            }
            None => out.push(0),
        }
        out
    }

    #[test]
    fn test_grid_round_trip() {
        let grid = grid();
        let record = decode_grid(&encode_grid(&grid)).unwrap();
        assert_eq!(record.into_grid(*grid.layout()).unwrap(), grid);
    }

    #[test]
    fn test_reads_legacy_layout() {
        let grid = grid();
        let record = decode_grid(&encode_legacy(&grid)).unwrap();
        assert_eq!(record.into_grid(*grid.layout()).unwrap(), grid);

        let mut segments = Vec::new();
        segments.extend_from_slice(MAGIC);
        segments.extend_from_slice(&LEGACY_VERSION.to_le_bytes());
        segments.extend_from_slice(&2u32.to_le_bytes());
        for _ in 0..2 {
            segments.extend_from_slice(&encode_legacy(&grid)[8..]);
        }
        assert_eq!(decode_segments(&segments).unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_sections_are_skipped() {
        let grid = grid();
        let mut bytes = encode_grid(&grid);
        put_section(&mut bytes, 77, &[1, 2, 3]);
        assert_eq!(decode_grid(&bytes).unwrap().cells, grid.cells());

        let mut segments = encode_segments(&[grid.clone(), grid.clone()]);
        put_section(&mut segments, 99, &[]);
        assert_eq!(decode_segments(&segments).unwrap().len(), 2);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(decode_grid(b"NOPE\x02\0\0\0"), Err(CacheError::BadMagic)));
        assert!(matches!(decode_grid(b"MV"), Err(CacheError::BadMagic)));
        assert!(matches!(
            decode_grid(b"MVOX\x09\0\0\0"),
            Err(CacheError::UnsupportedVersion(9))
        ));

        let bytes = encode_grid(&grid());
        assert!(matches!(
            decode_grid(&bytes[..bytes.len() - 5]),
            Err(CacheError::Truncated)
        ));

        let mut segments = encode_segments(&[grid()]);
        segments[20..24].copy_from_slice(&3u32.to_le_bytes());
        assert!(matches!(decode_segments(&segments), Err(CacheError::Malformed(_))));
    }
}
