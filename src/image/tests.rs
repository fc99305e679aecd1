use super::rect::Rect;
use super::*;
use Color as C;

fn mkframe<const W: usize, const H: usize>(order: ChannelOrder, data: [[Color; W]; H]) -> Frame {
    let mut frame = Frame::new(Resolution::new(W as u32, H as u32), order);
    for (y, row) in data.iter().enumerate() {
        for (x, color) in row.iter().enumerate() {
            frame.set(x as u32, y as u32, *color);
        }
    }
    frame
}

#[test]
fn channel_layout() {
    let bgr = mkframe(ChannelOrder::Bgr, [[C::from_rgb8(1, 2, 3)]]);
    assert_eq!(bgr.data().as_slice().unwrap(), &[3, 2, 1]);

    let rgb = mkframe(ChannelOrder::Rgb, [[C::from_rgb8(1, 2, 3)]]);
    assert_eq!(rgb.data().as_slice().unwrap(), &[1, 2, 3]);
}

#[test]
fn convert_swaps_outer_channels() {
    let bgr = mkframe(ChannelOrder::Bgr, [[C::RED, C::from_rgb8(10, 20, 30)]]);
    let rgb = convert(&bgr, ChannelOrder::Rgb);

    assert_eq!(rgb.order(), ChannelOrder::Rgb);
    assert_eq!(rgb.resolution(), bgr.resolution());
    // Same colors, different memory layout.
    assert_eq!(rgb.get(0, 0), C::RED);
    assert_eq!(rgb.get(1, 0), C::from_rgb8(10, 20, 30));
    assert_eq!(
        rgb.data().as_slice().unwrap(),
        &[255, 0, 0, 10, 20, 30],
    );
    assert_eq!(
        bgr.data().as_slice().unwrap(),
        &[0, 0, 255, 30, 20, 10],
    );
}

#[test]
fn convert_roundtrip_is_identity() {
    let mut raw = Vec::new();
    for i in 0..(7 * 5 * 3) {
        raw.push((i * 37 % 256) as u8);
    }
    let original = Frame::from_raw(Resolution::new(7, 5), ChannelOrder::Bgr, raw).unwrap();

    let there = convert(&original, ChannelOrder::Rgb);
    assert_ne!(there, original);
    let back = convert(&there, ChannelOrder::Bgr);
    assert_eq!(back, original);
}

#[test]
fn convert_to_same_order_copies() {
    let frame = mkframe(ChannelOrder::Rgb, [[C::GREEN, C::BLUE], [C::WHITE, C::RED]]);
    assert_eq!(convert(&frame, ChannelOrder::Rgb), frame);
}

#[test]
fn from_raw_checks_length() {
    let res = Resolution::new(2, 2);
    assert!(Frame::from_raw(res, ChannelOrder::Rgb, vec![0; 12]).is_ok());
    assert!(Frame::from_raw(res, ChannelOrder::Rgb, vec![0; 11]).is_err());
}

#[test]
fn rgba_export() {
    let frame = mkframe(ChannelOrder::Bgr, [[C::from_rgb8(1, 2, 3), C::WHITE]]);
    assert_eq!(frame.to_rgba8(), [1, 2, 3, 255, 255, 255, 255, 255]);
}

#[test]
fn sample_outside_is_black() {
    let frame = mkframe(ChannelOrder::Rgb, [[C::RED, C::GREEN], [C::BLUE, C::WHITE]]);
    let rect = Rect::from_top_left(0.0, 0.0, 2.0, 2.0).into();
    assert_eq!(frame.sample(&rect, 0.0, 0.0), C::RED);
    assert_eq!(frame.sample(&rect, 0.5, 0.0), C::GREEN);
    assert_eq!(frame.sample(&rect, 0.0, 0.5), C::BLUE);

    let far = Rect::from_top_left(100.0, 100.0, 2.0, 2.0).into();
    assert_eq!(frame.sample(&far, 0.5, 0.5), C::BLACK);
}
