//! Hand sign classification.

use crate::hand::landmark::{LandmarkIdx, LandmarkSet};
use crate::image::{draw, Color, Frame};

/// Text drawn onto the frame while a "scissors" hand sign is visible.
pub const SCISSORS_LABEL: &str = "SCISSORS!";

/// Position of the top left corner of [`SCISSORS_LABEL`], in pixels.
const LABEL_POS: (i32, i32) = (50, 50);

/// Returns whether `hand` shows the "scissors" sign: index and middle finger extended upwards.
///
/// A finger counts as extended if its tip is above (has a smaller Y coordinate than) its PIP
/// joint. The other fingers are not looked at, and neither is the hand's rotation, so a flat hand
/// or a hand pointing down will not be classified correctly.
pub fn is_scissors(hand: &LandmarkSet) -> bool {
    use LandmarkIdx::*;

    hand[IndexFingerTip].y() < hand[IndexFingerPip].y()
        && hand[MiddleFingerTip].y() < hand[MiddleFingerPip].y()
}

/// Draws [`SCISSORS_LABEL`] onto `frame`.
pub fn draw_scissors_label(frame: &mut Frame) {
    let (x, y) = LABEL_POS;
    draw::text(frame, x, y, SCISSORS_LABEL)
        .align_left()
        .align_bottom()
        .large()
        .color(Color::GREEN);
}

#[cfg(test)]
mod tests {
    use crate::hand::landmark::Landmark;
    use crate::image::{ChannelOrder, Resolution};

    use super::*;

    fn hand(index: (f32, f32), middle: (f32, f32)) -> LandmarkSet {
        use LandmarkIdx::*;

        let mut set = LandmarkSet::default();
        set.set(IndexFingerPip, Landmark::new(0.4, index.0, 0.0));
        set.set(IndexFingerTip, Landmark::new(0.4, index.1, 0.0));
        set.set(MiddleFingerPip, Landmark::new(0.5, middle.0, 0.0));
        set.set(MiddleFingerTip, Landmark::new(0.5, middle.1, 0.0));
        set
    }

    #[test]
    fn both_fingers_up() {
        assert!(is_scissors(&hand((0.5, 0.3), (0.5, 0.3))));
    }

    #[test]
    fn index_finger_down() {
        assert!(!is_scissors(&hand((0.5, 0.6), (0.5, 0.3))));
        assert!(!is_scissors(&hand((0.5, 0.6), (0.5, 0.6))));
    }

    #[test]
    fn middle_finger_down() {
        assert!(!is_scissors(&hand((0.5, 0.3), (0.5, 0.6))));
    }

    #[test]
    fn equal_height_is_not_extended() {
        assert!(!is_scissors(&hand((0.5, 0.5), (0.5, 0.3))));
    }

    #[test]
    fn label() {
        let mut frame = Frame::new(Resolution::new(200, 100), ChannelOrder::Bgr);
        draw_scissors_label(&mut frame);

        let mut lit = Vec::new();
        for y in 0..frame.height() {
            for x in 0..frame.width() {
                if frame.get(x, y) != Color::BLACK {
                    assert_eq!(frame.get(x, y), Color::GREEN);
                    lit.push((x, y));
                }
            }
        }
        assert!(!lit.is_empty());
        assert!(lit.iter().all(|&(x, y)| x >= 50 && y <= 50));
    }
}
