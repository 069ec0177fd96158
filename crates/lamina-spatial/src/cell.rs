//! Cell id arithmetic and the cube-face projection.

/// Deepest cell level; a leaf cell spans one ij grid unit.
pub const MAX_LEVEL: u8 = 30;

const FACE_BITS: u32 = 3;
const NUM_FACES: u8 = 6;
const MAX_SIZE: u32 = 1 << MAX_LEVEL;

// Hilbert sub-cell traversal tables. `orientation` is a 2-bit state:
// bit 0 swaps the i/j axes, bit 1 inverts their directions.
const SWAP_MASK: u8 = 0x01;
const INVERT_MASK: u8 = 0x02;

const POS_TO_IJ: [[u8; 4]; 4] = [
    [0, 1, 3, 2], // canonical
    [0, 2, 3, 1], // axes swapped
    [3, 2, 0, 1], // bits inverted
    [3, 1, 0, 2], // swapped & inverted
];

const IJ_TO_POS: [[u8; 4]; 4] = [
    [0, 1, 3, 2],
    [0, 3, 1, 2],
    [2, 3, 1, 0],
    [2, 1, 3, 0],
];

const POS_TO_ORIENTATION: [u8; 4] = [SWAP_MASK, 0, 0, INVERT_MASK | SWAP_MASK];

///
/// LatLon
///
/// Degrees; latitude in [-90, 90], longitude in [-180, 180].
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Central angle to another point, in degrees.
    #[must_use]
    pub fn angle_to(&self, other: &Self) -> f64 {
        let a = self.to_xyz();
        let b = other.to_xyz();
        let dot = (a.0 * b.0 + a.1 * b.1 + a.2 * b.2).clamp(-1.0, 1.0);
        dot.acos().to_degrees()
    }

    fn to_xyz(self) -> (f64, f64, f64) {
        let lat = self.lat.to_radians();
        let lon = self.lon.to_radians();
        (lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
    }

    fn from_xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            lat: z.atan2(x.hypot(y)).to_degrees(),
            lon: y.atan2(x).to_degrees(),
        }
    }
}

///
/// CellId
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CellId(pub u64);

impl CellId {
    /// The level-0 cell for one cube face.
    #[must_use]
    pub const fn from_face(face: u8) -> Self {
        Self(((face as u64) << (64 - FACE_BITS)) + (1u64 << 60))
    }

    /// Leaf cell containing a point, then lifted to `level`.
    #[must_use]
    pub fn from_lat_lon(point: LatLon, level: u8) -> Self {
        let (x, y, z) = point.to_xyz();
        let (face, u, v) = xyz_to_face_uv(x, y, z);
        let i = st_to_ij(uv_to_st(u));
        let j = st_to_ij(uv_to_st(v));
        Self::from_face_ij(face, i, j).parent(level)
    }

    /// Center of this cell.
    #[must_use]
    pub fn to_lat_lon(self) -> LatLon {
        let (face, i, j, _) = self.to_face_ij();
        // The decoded ij is the leaf at this cell's marker bit, which sits
        // at the cell center.
        let u = st_to_uv((f64::from(i) + 0.5) / f64::from(MAX_SIZE));
        let v = st_to_uv((f64::from(j) + 0.5) / f64::from(MAX_SIZE));
        let (x, y, z) = face_uv_to_xyz(face, u, v);
        LatLon::from_xyz(x, y, z)
    }

    #[must_use]
    pub const fn face(self) -> u8 {
        (self.0 >> (64 - FACE_BITS)) as u8
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.face() < NUM_FACES && (self.lsb() & 0x1555_5555_5555_5555) != 0
    }

    #[must_use]
    pub const fn is_leaf(self) -> bool {
        self.0 & 1 == 1
    }

    #[must_use]
    pub const fn level(self) -> u8 {
        MAX_LEVEL - (self.0.trailing_zeros() / 2) as u8
    }

    const fn lsb(self) -> u64 {
        self.0 & self.0.wrapping_neg()
    }

    const fn lsb_for_level(level: u8) -> u64 {
        1u64 << (2 * (MAX_LEVEL - level))
    }

    /// Ancestor at a coarser `level`.
    #[must_use]
    pub const fn parent(self, level: u8) -> Self {
        let new_lsb = Self::lsb_for_level(level);
        Self((self.0 & new_lsb.wrapping_neg()) | new_lsb)
    }

    /// The four children one level down, in Hilbert traversal order.
    #[must_use]
    pub const fn children(self) -> [Self; 4] {
        let new_lsb = self.lsb() >> 2;
        let base = self.0 - self.lsb() + new_lsb;
        [
            Self(base),
            Self(base + 2 * new_lsb),
            Self(base + 4 * new_lsb),
            Self(base + 6 * new_lsb),
        ]
    }

    /// Smallest leaf id inside this cell.
    #[must_use]
    pub const fn range_min(self) -> Self {
        Self(self.0 - (self.lsb() - 1))
    }

    /// Largest leaf id inside this cell.
    #[must_use]
    pub const fn range_max(self) -> Self {
        Self(self.0 + (self.lsb() - 1))
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.range_min().0 <= other.0 && other.0 <= self.range_max().0
    }

    /// The four edge-adjacent neighbors at this cell's level.
    #[must_use]
    pub fn edge_neighbors(self) -> [Self; 4] {
        let level = self.level();
        let size = i64::from(1u32 << (MAX_LEVEL - level));
        let (face, i, j, _) = self.to_face_ij();
        let (i, j) = (i64::from(i), i64::from(j));

        [
            Self::from_face_ij_offset(face, i, j - size, level),
            Self::from_face_ij_offset(face, i + size, j, level),
            Self::from_face_ij_offset(face, i, j + size, level),
            Self::from_face_ij_offset(face, i - size, j, level),
        ]
    }

    // -- ij plumbing

    fn from_face_ij(face: u8, i: u32, j: u32) -> Self {
        let mut pos: u64 = 0;
        let mut orientation = face & SWAP_MASK;

        for k in (0..MAX_LEVEL).rev() {
            let i_bit = (i >> k) & 1;
            let j_bit = (j >> k) & 1;
            let ij = ((i_bit << 1) | j_bit) as usize;
            let cell = IJ_TO_POS[orientation as usize][ij];
            pos = (pos << 2) | u64::from(cell);
            orientation ^= POS_TO_ORIENTATION[cell as usize];
        }

        Self((u64::from(face) << (64 - FACE_BITS)) | (pos << 1) | 1)
    }

    fn to_face_ij(self) -> (u8, u32, u32, u8) {
        let face = self.face();
        let pos = (self.0 >> 1) & ((1u64 << 60) - 1);
        let mut orientation = face & SWAP_MASK;
        let mut i: u32 = 0;
        let mut j: u32 = 0;

        for k in (0..MAX_LEVEL).rev() {
            let cell = ((pos >> (2 * k)) & 3) as usize;
            let ij = POS_TO_IJ[orientation as usize][cell];
            i = (i << 1) | u32::from(ij >> 1);
            j = (j << 1) | u32::from(ij & 1);
            orientation ^= POS_TO_ORIENTATION[cell];
        }

        (face, i, j, orientation)
    }

    fn from_face_ij_offset(face: u8, i: i64, j: i64, level: u8) -> Self {
        let max = i64::from(MAX_SIZE);
        if (0..max).contains(&i) && (0..max).contains(&j) {
            return Self::from_face_ij(face, i as u32, j as u32).parent(level);
        }
        Self::from_face_ij_wrap(face, i, j).parent(level)
    }

    // Coordinates just off one face edge wrap onto the adjacent face by a
    // round trip through (u, v) space.
    fn from_face_ij_wrap(face: u8, i: i64, j: i64) -> Self {
        let max = i64::from(MAX_SIZE);
        let i = i.clamp(-1, max);
        let j = j.clamp(-1, max);

        let scale = 1.0 / f64::from(MAX_SIZE);
        let limit = 1.0 + f64::EPSILON;
        let u = (scale * (2.0 * (i as f64) + 1.0 - f64::from(MAX_SIZE))).clamp(-limit, limit);
        let v = (scale * (2.0 * (j as f64) + 1.0 - f64::from(MAX_SIZE))).clamp(-limit, limit);

        let (x, y, z) = face_uv_to_xyz(face, u, v);
        let (new_face, new_u, new_v) = xyz_to_face_uv(x, y, z);

        Self::from_face_ij(
            new_face,
            st_to_ij(0.5 * (new_u + 1.0)),
            st_to_ij(0.5 * (new_v + 1.0)),
        )
    }
}

// -- cube-face projection

fn st_to_ij(s: f64) -> u32 {
    let scaled = (s * f64::from(MAX_SIZE)).floor();
    scaled.clamp(0.0, f64::from(MAX_SIZE - 1)) as u32
}

// Quadratic projection: near-uniform cell areas across a face.
fn st_to_uv(s: f64) -> f64 {
    if s >= 0.5 {
        (1.0 / 3.0) * (4.0 * s * s - 1.0)
    } else {
        (1.0 / 3.0) * (1.0 - 4.0 * (1.0 - s) * (1.0 - s))
    }
}

fn uv_to_st(u: f64) -> f64 {
    if u >= 0.0 {
        0.5 * (1.0 + 3.0 * u).sqrt()
    } else {
        1.0 - 0.5 * (1.0 - 3.0 * u).sqrt()
    }
}

fn face_uv_to_xyz(face: u8, u: f64, v: f64) -> (f64, f64, f64) {
    match face {
        0 => (1.0, u, v),
        1 => (-u, 1.0, v),
        2 => (-u, -v, 1.0),
        3 => (-1.0, -v, -u),
        4 => (v, -1.0, -u),
        _ => (v, u, -1.0),
    }
}

fn xyz_to_face_uv(x: f64, y: f64, z: f64) -> (u8, f64, f64) {
    let abs = [x.abs(), y.abs(), z.abs()];
    let axis = if abs[0] >= abs[1] && abs[0] >= abs[2] {
        0
    } else if abs[1] >= abs[2] {
        1
    } else {
        2
    };
    let face = match (axis, [x, y, z][axis] > 0.0) {
        (0, true) => 0,
        (0, false) => 3,
        (1, true) => 1,
        (1, false) => 4,
        (2, true) => 2,
        _ => 5,
    };

    let (u, v) = match face {
        0 => (y / x, z / x),
        1 => (-x / y, z / y),
        2 => (-x / z, -y / z),
        3 => (z / x, y / x),
        4 => (z / y, -x / y),
        _ => (-y / z, -x / z),
    };

    (face, u, v)
}

#[cfg(test)]
mod tests;
