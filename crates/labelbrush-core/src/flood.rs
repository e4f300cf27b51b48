//! Stack-based 4-connected scan-line flood fill on a 2-D grid.
//!
//! Used to close the holes a free-hand stroke leaves inside a closed loop:
//! flood the outside from a seed, then everything the flood never reached
//! is inside the loop.

/// Flood every zero cell 4-connected to `seed` with `1`.
///
/// `grid` is row-major with `width * height` cells. Does nothing if the
/// grid is too short, the seed is out of range, or the seed cell is
/// already non-zero.
pub fn scanline_fill(grid: &mut [u8], width: usize, height: usize, seed: (usize, usize)) {
    let Some(cells) = width.checked_mul(height) else {
        return;
    };
    if grid.len() < cells || seed.0 >= width || seed.1 >= height {
        return;
    }

    let mut stack = vec![seed];
    while let Some((x, y)) = stack.pop() {
        let row = y * width;
        if grid[row + x] != 0 {
            continue;
        }

        let mut x1 = x;
        while x1 > 0 && grid[row + x1 - 1] == 0 {
            x1 -= 1;
        }

        let mut span_above = false;
        let mut span_below = false;
        while x1 < width && grid[row + x1] == 0 {
            grid[row + x1] = 1;

            if y > 0 {
                let open = grid[row - width + x1] == 0;
                if !span_above && open {
                    stack.push((x1, y - 1));
                    span_above = true;
                } else if span_above && !open {
                    span_above = false;
                }
            }
            if y + 1 < height {
                let open = grid[row + width + x1] == 0;
                if !span_below && open {
                    stack.push((x1, y + 1));
                    span_below = true;
                } else if span_below && !open {
                    span_below = false;
                }
            }

            x1 += 1;
        }
    }
}
