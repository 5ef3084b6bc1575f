use std::fmt;

/// Clockwise rotation applied when displaying an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotate {
    #[default]
    Rotate0,
    Rotate90,
    Rotate180,
    Rotate270,
}

use Rotate::{Rotate0, Rotate90, Rotate180, Rotate270};

// COMPOSE[current][applied]: rotation after applying `applied` to `current`.
const COMPOSE: [[Rotate; 4]; 4] = [
    [Rotate0, Rotate90, Rotate180, Rotate270],
    [Rotate90, Rotate180, Rotate270, Rotate0],
    [Rotate180, Rotate270, Rotate0, Rotate90],
    [Rotate270, Rotate0, Rotate90, Rotate180],
];

impl Rotate {
    fn index(self) -> usize {
        match self {
            Rotate0 => 0,
            Rotate90 => 1,
            Rotate180 => 2,
            Rotate270 => 3,
        }
    }

    /// The rotation that undoes this one.
    pub fn inverse(self) -> Rotate {
        match self {
            Rotate0 => Rotate0,
            Rotate90 => Rotate270,
            Rotate180 => Rotate180,
            Rotate270 => Rotate90,
        }
    }

    pub fn degrees(self) -> u32 {
        90 * self.index() as u32
    }

    /// Whether width and height swap when displayed.
    pub fn is_transposed(self) -> bool {
        matches!(self, Rotate90 | Rotate270)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Orientation {
    pub rotate: Rotate,
    pub horizontal_flip: bool,
}

impl Orientation {
    pub const NORMAL: Orientation = Orientation::new(Rotate0, false);
    pub const ROTATE_LEFT: Orientation = Orientation::new(Rotate270, false);
    pub const ROTATE_RIGHT: Orientation = Orientation::new(Rotate90, false);
    pub const FLIP_HORIZONTAL: Orientation = Orientation::new(Rotate0, true);
    pub const FLIP_VERTICAL: Orientation = Orientation::new(Rotate180, true);

    pub const fn new(rotate: Rotate, horizontal_flip: bool) -> Self {
        Self {
            rotate,
            horizontal_flip,
        }
    }

    /// Apply `modify` on top of this orientation.
    ///
    /// An image that is already flipped rotates in the opposite sense, so the
    /// applied rotation is inverted before composing when `self` is flipped.
    pub fn compose(self, modify: Orientation) -> Orientation {
        let applied = if self.horizontal_flip {
            modify.rotate.inverse()
        } else {
            modify.rotate
        };

        Orientation {
            rotate: COMPOSE[self.rotate.index()][applied.index()],
            horizontal_flip: self.horizontal_flip ^ modify.horizontal_flip,
        }
    }

    /// Map an EXIF orientation tag value (1-8); anything else is normal.
    pub fn from_exif(value: u32) -> Orientation {
        match value {
            2 => Orientation::new(Rotate0, true),
            3 => Orientation::new(Rotate180, false),
            4 => Orientation::new(Rotate180, true),
            5 => Orientation::new(Rotate270, true),
            6 => Orientation::new(Rotate90, false),
            7 => Orientation::new(Rotate90, true),
            8 => Orientation::new(Rotate270, false),
            _ => Orientation::NORMAL,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.rotate.degrees())?;
        if self.horizontal_flip {
            write!(f, " flipped")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_right_cycles_clockwise() {
        let mut o = Orientation::NORMAL;
        let mut seen = Vec::new();
        for _ in 0..4 {
            o = o.compose(Orientation::ROTATE_RIGHT);
            seen.push(o.rotate);
        }
        assert_eq!(seen, vec![Rotate90, Rotate180, Rotate270, Rotate0]);
        assert!(!o.horizontal_flip);
    }

    #[test]
    fn rotate_left_undoes_rotate_right() {
        for rotate in [Rotate0, Rotate90, Rotate180, Rotate270] {
            for flip in [false, true] {
                let o = Orientation::new(rotate, flip);
                assert_eq!(
                    o.compose(Orientation::ROTATE_RIGHT)
                        .compose(Orientation::ROTATE_LEFT),
                    o
                );
            }
        }
    }

    #[test]
    fn flipped_image_rotates_the_other_way() {
        let flipped = Orientation::FLIP_HORIZONTAL;
        assert_eq!(
            flipped.compose(Orientation::ROTATE_RIGHT),
            Orientation::new(Rotate270, true)
        );
        assert_eq!(
            flipped.compose(Orientation::ROTATE_LEFT),
            Orientation::new(Rotate90, true)
        );
    }

    #[test]
    fn flip_is_xor() {
        let o = Orientation::new(Rotate90, false);
        let once = o.compose(Orientation::FLIP_HORIZONTAL);
        assert_eq!(once, Orientation::new(Rotate90, true));
        assert_eq!(once.compose(Orientation::FLIP_HORIZONTAL), o);
    }

    #[test]
    fn flip_vertical_of_normal_is_exif_mirror_vertical() {
        assert_eq!(
            Orientation::NORMAL.compose(Orientation::FLIP_VERTICAL),
            Orientation::from_exif(4)
        );
    }

    #[test]
    fn exif_mapping() {
        assert_eq!(Orientation::from_exif(1), Orientation::NORMAL);
        assert_eq!(Orientation::from_exif(6).rotate, Rotate90);
        assert_eq!(Orientation::from_exif(8).rotate, Rotate270);
        assert!(Orientation::from_exif(5).horizontal_flip);
        assert_eq!(Orientation::from_exif(0), Orientation::NORMAL);
        assert_eq!(Orientation::from_exif(9), Orientation::NORMAL);
    }
}
