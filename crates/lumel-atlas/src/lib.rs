//! Fixed-size output pages and first-fit raw-lightmap placement.
#![forbid(unsafe_code)]

/// Where a raw lightmap channel landed: page index plus texel offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub page: usize,
    pub x: usize,
    pub y: usize,
}

/// The footprint a channel asks the packer for. A solid channel stamps a
/// single texel regardless of its grid size; a non-solid channel stamps
/// every texel whose `mask` bit is set.
pub struct Stamp<'a> {
    pub w: usize,
    pub h: usize,
    pub solid: bool,
    /// `w * h` validity bits, row-major. Ignored when `solid`.
    pub mask: &'a [bool],
}

impl Stamp<'_> {
    #[inline]
    fn stamp_dims(&self) -> (usize, usize) {
        if self.solid { (1, 1) } else { (self.w, self.h) }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PackerConfig {
    pub width: usize,
    pub height: usize,
    /// Strided candidate scan instead of exhaustive first-fit.
    pub fast: bool,
    /// Once more pages than this exist, only the newest ones are scanned.
    pub search_block: usize,
    /// New pages are flagged for standalone-image emission instead of the
    /// map lump.
    pub external: bool,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            fast: false,
            search_block: 10,
            external: false,
        }
    }
}

pub struct OutputPage {
    pub index: usize,
    pub width: usize,
    pub height: usize,
    occupancy: Vec<bool>,
    pub free: usize,
    /// Shader ids whose surfaces landed here; styled channels prefer pages
    /// their shader already lives on.
    pub shaders: Vec<u16>,
    /// Emitted as a standalone image rather than into the map lump.
    pub external: bool,
}

impl OutputPage {
    fn new(index: usize, width: usize, height: usize, external: bool) -> Self {
        Self {
            index,
            width,
            height,
            occupancy: vec![false; width * height],
            free: width * height,
            shaders: Vec::new(),
            external,
        }
    }

    #[inline]
    pub fn occupied(&self, x: usize, y: usize) -> bool {
        self.occupancy[y * self.width + x]
    }

    pub fn has_shader(&self, shader: u16) -> bool {
        self.shaders.contains(&shader)
    }

    fn note_shader(&mut self, shader: u16) {
        if !self.has_shader(shader) {
            self.shaders.push(shader);
        }
    }

    /// Stamp test: every required bit under the stamp must be free.
    fn fits(&self, stamp: &Stamp<'_>, x: usize, y: usize) -> bool {
        let (sw, sh) = stamp.stamp_dims();
        if x + sw > self.width || y + sh > self.height {
            return false;
        }
        if stamp.solid {
            return !self.occupied(x, y);
        }
        for dy in 0..sh {
            let row = (y + dy) * self.width + x;
            let mask_row = dy * stamp.w;
            for dx in 0..sw {
                if stamp.mask[mask_row + dx] && self.occupancy[row + dx] {
                    return false;
                }
            }
        }
        true
    }

    /// Sets the stamp's bits. Occupancy only ever grows; a placement is
    /// never retracted within a run.
    fn commit(&mut self, stamp: &Stamp<'_>, x: usize, y: usize, shader: u16) {
        if stamp.solid {
            self.occupancy[y * self.width + x] = true;
            self.free -= 1;
        } else {
            for dy in 0..stamp.h {
                for dx in 0..stamp.w {
                    if stamp.mask[dy * stamp.w + dx] {
                        let i = (y + dy) * self.width + x + dx;
                        if !self.occupancy[i] {
                            self.occupancy[i] = true;
                            self.free -= 1;
                        }
                    }
                }
            }
        }
        self.note_shader(shader);
    }
}

pub struct AtlasPacker {
    pub cfg: PackerConfig,
    pub pages: Vec<OutputPage>,
}

impl AtlasPacker {
    pub fn new(cfg: PackerConfig) -> Self {
        Self {
            cfg,
            pages: Vec::new(),
        }
    }

    /// Index of the first page worth scanning. Old pages are mostly full;
    /// skipping them trades a little density for locality.
    fn scan_start(&self) -> usize {
        if self.cfg.search_block > 0 && self.pages.len() > self.cfg.search_block {
            self.pages.len() - self.cfg.search_block
        } else {
            0
        }
    }

    fn try_page(&mut self, page: usize, stamp: &Stamp<'_>, shader: u16) -> Option<Placement> {
        let (sw, sh) = stamp.stamp_dims();
        let needed = if stamp.solid {
            1
        } else {
            stamp.mask.iter().filter(|&&b| b).count()
        };
        let (pw, ph) = (self.pages[page].width, self.pages[page].height);
        if self.pages[page].free < needed || sw > pw || sh > ph {
            return None;
        }
        let (step_x, step_y) = if self.cfg.fast {
            (sw.max(1), sh.max(1))
        } else {
            (1, 1)
        };
        let mut y = 0;
        while y + sh <= ph {
            let mut x = 0;
            while x + sw <= pw {
                if self.pages[page].fits(stamp, x, y) {
                    self.pages[page].commit(stamp, x, y, shader);
                    return Some(Placement { page, x, y });
                }
                x += step_x;
            }
            y += step_y;
        }
        None
    }

    fn try_correlated(
        &mut self,
        stamp: &Stamp<'_>,
        shader: u16,
        anchor: Placement,
    ) -> Option<Placement> {
        // Styled channels retry the style-0 position (and half-page shifts of
        // it) on pages already carrying this shader, so runtime shader stages
        // can share texture state.
        let half_w = self.cfg.width / 2;
        let half_h = self.cfg.height / 2;
        let mut candidates = vec![(anchor.x, anchor.y)];
        for (dx, dy) in [(half_w, 0), (0, half_h), (half_w, half_h)] {
            candidates.push(((anchor.x + dx) % self.cfg.width, (anchor.y + dy) % self.cfg.height));
        }
        for pass in 0..2 {
            for page in 0..self.pages.len() {
                if pass == 0 && !self.pages[page].has_shader(shader) {
                    continue;
                }
                for &(x, y) in &candidates {
                    if self.pages[page].fits(stamp, x, y) {
                        self.pages[page].commit(stamp, x, y, shader);
                        return Some(Placement { page, x, y });
                    }
                }
            }
        }
        None
    }

    /// Places a stamp, allocating a fresh page when nothing fits.
    /// `anchor` is the style-0 placement for styled channels.
    pub fn place(
        &mut self,
        stamp: &Stamp<'_>,
        shader: u16,
        anchor: Option<Placement>,
    ) -> Placement {
        if let Some(a) = anchor {
            if let Some(p) = self.try_correlated(stamp, shader, a) {
                return p;
            }
        }
        for page in self.scan_start()..self.pages.len() {
            if let Some(p) = self.try_page(page, stamp, shader) {
                return p;
            }
        }
        let index = self.pages.len();
        log::debug!("atlas: opening page {}", index);
        self.pages.push(OutputPage::new(
            index,
            self.cfg.width,
            self.cfg.height,
            self.cfg.external,
        ));
        self.try_page(index, stamp, shader)
            .unwrap_or_else(|| unreachable!("fresh page rejected a page-bounded stamp"))
    }
}
