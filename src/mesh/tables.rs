/// Cube lookup tables for surface extraction
///
/// Corner `i` of a cell sits at offset `(i & 1, (i >> 1) & 1, (i >> 2) & 1)`.

/// Corner offsets, indexed by corner bit pattern
pub const CUBE_CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

/// The 12 cube edges as corner pairs; x edges, then y, then z
pub const CUBE_EDGES: [[usize; 2]; 12] = [
    [0b000, 0b001],
    [0b010, 0b011],
    [0b100, 0b101],
    [0b110, 0b111],
    [0b000, 0b010],
    [0b001, 0b011],
    [0b100, 0b110],
    [0b101, 0b111],
    [0b000, 0b100],
    [0b001, 0b101],
    [0b010, 0b110],
    [0b011, 0b111],
];

/// Corner sign mask (bit set = positive sample) to 12-bit crossed-edge mask
pub const EDGE_TABLE: [u16; 256] = build_edge_table();

const fn build_edge_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut mask = 0;
    while mask < 256 {
        let mut edges = 0u16;
        let mut e = 0;
        while e < 12 {
            let a = (mask >> CUBE_EDGES[e][0]) & 1;
            let b = (mask >> CUBE_EDGES[e][1]) & 1;
            if a != b {
                edges |= 1 << e;
            }
            e += 1;
        }
        table[mask] = edges;
        mask += 1;
    }
    table
}
