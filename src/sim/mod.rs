pub mod gpucompute;
pub mod ring;

/// Probability that a randomly seeded cell starts alive.
pub const ALIVE_PROBABILITY: f32 = 0.4;

/// Grid size in cells. Fixed for the lifetime of one simulation instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridDimensions {
    pub width: u32,
    pub height: u32,
}

impl GridDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Keeps `width` and derives the height from the viewport aspect ratio.
    pub fn fit_to_viewport(width: u32, viewport_width: u32, viewport_height: u32) -> Self {
        let width = width.max(1);
        let height = (width as f64 * viewport_height as f64 / viewport_width.max(1) as f64).round();
        Self::new(width, height as u32)
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size in bytes of one generation on the GPU (one `u32` per cell).
    pub fn generation_size(&self) -> u64 {
        (self.cell_count() * std::mem::size_of::<u32>()) as u64
    }
}

/// How the first generation is produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum InitialState {
    /// Every cell alive with [`ALIVE_PROBABILITY`].
    #[default]
    Random,
    /// Row-major cell values, used verbatim when the length is `width * height`.
    Flat(Vec<u32>),
    /// Rows of cell values, centered in the grid; the rest is random.
    Pattern(Vec<Vec<u32>>),
}

impl InitialState {
    /// Splits row-major `cells` into rows of `width`. A trailing partial row
    /// is kept; missing values read as dead.
    pub fn from_pattern_cells(cells: &[u32], width: usize) -> Self {
        if width == 0 || cells.is_empty() {
            return InitialState::Pattern(Vec::new());
        }
        InitialState::Pattern(cells.chunks(width).map(<[u32]>::to_vec).collect())
    }
}

/// One full snapshot of the automaton, row-major, one `u32` in `{0, 1}` per cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generation {
    pub dims: GridDimensions,
    pub cells: Vec<u32>,
}

impl Generation {
    pub fn dead(dims: GridDimensions) -> Self {
        Self {
            dims,
            cells: vec![0; dims.cell_count()],
        }
    }

    /// Builds a generation from live coordinates `(x, y)`.
    pub fn from_live(dims: GridDimensions, live: &[(u32, u32)]) -> Self {
        let mut generation = Self::dead(dims);
        for &(x, y) in live {
            generation.set(x, y, 1);
        }
        generation
    }

    pub fn seed(dims: GridDimensions, initial: &InitialState) -> Self {
        Self::seed_with(dims, initial, &mut fastrand::Rng::new())
    }

    pub fn seed_with(dims: GridDimensions, initial: &InitialState, rng: &mut fastrand::Rng) -> Self {
        match initial {
            InitialState::Flat(cells) if cells.len() == dims.cell_count() => Self {
                dims,
                cells: cells.clone(),
            },
            InitialState::Flat(cells) => {
                log::warn!(
                    "initial state has {} cells but the grid has {}; seeding randomly",
                    cells.len(),
                    dims.cell_count()
                );
                Self::random(dims, rng)
            }
            InitialState::Pattern(rows) if rows.first().is_some_and(|r| !r.is_empty()) => {
                Self::centered(dims, rows, rng)
            }
            InitialState::Pattern(_) | InitialState::Random => Self::random(dims, rng),
        }
    }

    fn random(dims: GridDimensions, rng: &mut fastrand::Rng) -> Self {
        Self {
            dims,
            cells: (0..dims.cell_count()).map(|_| random_cell(rng)).collect(),
        }
    }

    fn centered(dims: GridDimensions, rows: &[Vec<u32>], rng: &mut fastrand::Rng) -> Self {
        let (pattern_width, pattern_height) = pattern_extent(rows);
        let (row_start, col_start) = pattern_origin(dims, pattern_width, pattern_height);
        let mut cells = Vec::with_capacity(dims.cell_count());
        for row in 0..dims.height as i64 {
            for col in 0..dims.width as i64 {
                let pr = row - row_start;
                let pc = col - col_start;
                let inside =
                    (0..pattern_height as i64).contains(&pr) && (0..pattern_width as i64).contains(&pc);
                cells.push(if inside {
                    // Short rows read as dead.
                    rows[pr as usize].get(pc as usize).copied().unwrap_or(0)
                } else {
                    random_cell(rng)
                });
            }
        }
        Self { dims, cells }
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.cells[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: u32) {
        let idx = self.index(x, y);
        self.cells[idx] = value;
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.dims.width as usize + x as usize
    }

    pub fn live_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }

    /// CPU reference of the compute shader: standard Conway rule on a torus.
    pub fn step(&self) -> Generation {
        let cells = (0..self.cells.len())
            .map(|i| {
                let neighbors = live_neighbors(&self.cells, i, self.dims);
                match neighbors {
                    2 => self.cells[i],
                    3 => 1,
                    _ => 0,
                }
            })
            .collect();
        Generation {
            dims: self.dims,
            cells,
        }
    }
}

/// Width and height of a 2D pattern; width is taken from the first row.
pub fn pattern_extent(rows: &[Vec<u32>]) -> (usize, usize) {
    (rows.first().map_or(0, Vec::len), rows.len())
}

/// Top-left `(row, col)` of a pattern centered in the grid. Negative when the
/// pattern is larger than the grid, in which case it is cropped.
pub fn pattern_origin(dims: GridDimensions, pattern_width: usize, pattern_height: usize) -> (i64, i64) {
    let row = (dims.height as f64 / 2.0 - pattern_height as f64 / 2.0).ceil() as i64;
    let col = (dims.width as f64 / 2.0 - pattern_width as f64 / 2.0).ceil() as i64;
    (row, col)
}

fn random_cell(rng: &mut fastrand::Rng) -> u32 {
    (rng.f32() > 1.0 - ALIVE_PROBABILITY) as u32
}

#[inline(always)]
fn live_neighbors(cells: &[u32], idx: usize, dims: GridDimensions) -> u32 {
    let width = dims.width as usize;
    let height = dims.height as usize;
    let row = idx / width;
    let col = idx % width;

    const N: [(usize, usize); 8] = [
        (usize::MAX, usize::MAX),
        (usize::MAX, 0),
        (usize::MAX, 1),
        (0, usize::MAX),
        (0, 1),
        (1, usize::MAX),
        (1, 0),
        (1, 1),
    ];

    N.iter()
        .map(|&(dr, dc)| {
            // usize::MAX stands for -1; adding `height`/`width` first keeps it in range.
            let nr = (row + height).wrapping_add(dr) % height;
            let nc = (col + width).wrapping_add(dc) % width;
            cells[nr * width + nc]
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> fastrand::Rng {
        fastrand::Rng::with_seed(0x11fe)
    }

    #[test]
    fn random_seed_is_about_forty_percent_alive() {
        let dims = GridDimensions::new(100, 100);
        let mut rng = rng();
        let trials = 20;
        let live: usize = (0..trials)
            .map(|_| Generation::seed_with(dims, &InitialState::Random, &mut rng).live_count())
            .sum();
        let fraction = live as f64 / (trials * dims.cell_count()) as f64;
        assert!((fraction - 0.4).abs() < 0.01, "live fraction {fraction}");
    }

    #[test]
    fn random_seed_only_uses_zero_and_one() {
        let g = Generation::seed_with(GridDimensions::new(7, 3), &InitialState::Random, &mut rng());
        assert!(g.cells.iter().all(|&c| c <= 1));
    }

    #[test]
    fn flat_state_is_copied_verbatim() {
        let dims = GridDimensions::new(3, 2);
        let flat = vec![1, 0, 1, 0, 0, 1];
        let g = Generation::seed_with(dims, &InitialState::Flat(flat.clone()), &mut rng());
        assert_eq!(g.cells, flat);
    }

    #[test]
    fn mismatched_flat_state_falls_back_to_random() {
        let dims = GridDimensions::new(50, 50);
        let g = Generation::seed_with(dims, &InitialState::Flat(vec![1; 10]), &mut rng());
        assert_eq!(g.cells.len(), dims.cell_count());
        let fraction = g.live_count() as f64 / dims.cell_count() as f64;
        assert!((fraction - 0.4).abs() < 0.05, "live fraction {fraction}");
    }

    #[test]
    fn pattern_is_centered() {
        let dims = GridDimensions::new(10, 9);
        let pattern = vec![vec![1, 1, 1], vec![0, 0, 0]];
        // ceil(9/2 - 2/2) = 4, ceil(10/2 - 3/2) = 4
        assert_eq!(pattern_origin(dims, 3, 2), (4, 4));
        let g = Generation::seed_with(dims, &InitialState::Pattern(pattern.clone()), &mut rng());
        for (r, row) in pattern.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                assert_eq!(g.get(4 + c as u32, 4 + r as u32), v);
            }
        }
    }

    #[test]
    fn cells_outside_pattern_are_random() {
        let dims = GridDimensions::new(60, 60);
        let pattern = vec![vec![0; 4]; 4];
        let g = Generation::seed_with(dims, &InitialState::Pattern(pattern), &mut rng());
        let (row0, col0) = pattern_origin(dims, 4, 4);
        let outside: Vec<u32> = (0..60)
            .flat_map(|y| (0..60).map(move |x| (x, y)))
            .filter(|&(x, y)| {
                !((row0..row0 + 4).contains(&(y as i64)) && (col0..col0 + 4).contains(&(x as i64)))
            })
            .map(|(x, y)| g.get(x, y))
            .collect();
        let fraction = outside.iter().sum::<u32>() as f64 / outside.len() as f64;
        assert!((fraction - 0.4).abs() < 0.05, "live fraction {fraction}");
    }

    #[test]
    fn oversized_pattern_is_cropped() {
        let dims = GridDimensions::new(2, 2);
        let pattern = vec![vec![1, 0, 1, 0], vec![0, 1, 1, 0], vec![1, 1, 0, 0], vec![0, 0, 0, 1]];
        let g = Generation::seed_with(dims, &InitialState::Pattern(pattern), &mut rng());
        // origin (-1, -1): the grid sees the pattern's inner 2x2
        assert_eq!(g.cells, vec![1, 1, 1, 0]);
    }

    #[test]
    fn empty_pattern_is_random() {
        let dims = GridDimensions::new(40, 40);
        let g = Generation::seed_with(dims, &InitialState::Pattern(vec![]), &mut rng());
        assert!(g.live_count() > 0);
    }

    #[test]
    fn viewport_fit_keeps_aspect_ratio() {
        assert_eq!(GridDimensions::fit_to_viewport(64, 1920, 1080), GridDimensions::new(64, 36));
        assert_eq!(GridDimensions::fit_to_viewport(10, 1000, 10).height, 1);
    }

    #[test]
    fn lonely_cell_dies() {
        let dims = GridDimensions::new(3, 3);
        let g = Generation::from_live(dims, &[(1, 1)]);
        assert_eq!(g.step().live_count(), 0);
    }

    #[test]
    fn full_three_by_three_torus_dies() {
        // every cell sees all 8 others
        let dims = GridDimensions::new(3, 3);
        let g = Generation {
            dims,
            cells: vec![1; 9],
        };
        assert_eq!(g.step(), Generation::dead(dims));
    }

    #[test]
    fn blinker_oscillates() {
        let dims = GridDimensions::new(5, 5);
        let horizontal = Generation::from_live(dims, &[(1, 2), (2, 2), (3, 2)]);
        let vertical = Generation::from_live(dims, &[(2, 1), (2, 2), (2, 3)]);
        let next = horizontal.step();
        assert_eq!(next, vertical);
        assert_eq!(next.step(), horizontal);
    }

    #[test]
    fn blinker_wraps_across_the_edge() {
        let dims = GridDimensions::new(5, 5);
        let horizontal = Generation::from_live(dims, &[(4, 0), (0, 0), (1, 0)]);
        let vertical = Generation::from_live(dims, &[(0, 4), (0, 0), (0, 1)]);
        assert_eq!(horizontal.step(), vertical);
    }

    #[test]
    fn block_is_still() {
        let dims = GridDimensions::new(4, 4);
        let block = Generation::from_live(dims, &[(1, 1), (2, 1), (1, 2), (2, 2)]);
        let mut g = block.clone();
        for _ in 0..8 {
            g = g.step();
            assert_eq!(g, block);
        }
    }

    #[test]
    fn glider_returns_home_on_torus() {
        let dims = GridDimensions::new(8, 8);
        let glider = Generation::from_live(dims, &[(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)]);
        let mut g = glider.clone();
        // period 4, one cell diagonal shift per period
        for _ in 0..32 {
            g = g.step();
        }
        assert_eq!(g, glider);
    }

    #[test]
    fn flat_pattern_cells_split_into_rows() {
        assert_eq!(
            InitialState::from_pattern_cells(&[0, 1, 0, 1, 1], 3),
            InitialState::Pattern(vec![vec![0, 1, 0], vec![1, 1]])
        );
        assert_eq!(
            InitialState::from_pattern_cells(&[1, 1], 0),
            InitialState::Pattern(Vec::new())
        );
    }
}
