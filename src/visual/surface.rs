use super::color::Rgb;

/// Something bars can be painted on. Coordinates grow right and down.
pub trait Surface {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn clear(&mut self);
    fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize, color: Rgb);
}

/// In-memory surface, one color slot per pixel.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct PixelSurface {
    width: usize,
    height: usize,
    pixels: Vec<Option<Rgb>>,
}

#[cfg(test)]
impl PixelSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![None; width * height],
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels[y * self.width + x]
    }

    /// Painted pixels in column `x`, counted from the bottom.
    pub fn column_height(&self, x: usize) -> usize {
        (0..self.height)
            .rev()
            .take_while(|&y| self.pixel(x, y).is_some())
            .count()
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(Option::is_none)
    }
}

#[cfg(test)]
impl Surface for PixelSurface {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn clear(&mut self) {
        self.pixels.fill(None);
    }

    fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize, color: Rgb) {
        let x_end = (x + width).min(self.width);
        let y_end = (y + height).min(self.height);
        for row in y.min(y_end)..y_end {
            let line = row * self.width;
            for slot in &mut self.pixels[line + x.min(x_end)..line + x_end] {
                *slot = Some(color);
            }
        }
    }
}
