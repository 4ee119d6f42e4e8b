//! Contention table properties over the whole frame.

use proptest::prelude::*;
use sinclair_ula::{CONTENTION_PATTERN, ContentionTable, ScreenConfiguration};

fn in_window(screen: &ScreenConfiguration, frame_tact: u64) -> Option<u64> {
    let (line, tact) = screen.position(frame_tact);
    if line < screen.first_display_line() || line > screen.last_display_line() {
        return None;
    }
    let start = screen.first_pixel_tact_in_line() - screen.pixel_data_prefetch_time;
    let length = screen.display_line_time - screen.pixel_data_prefetch_time;
    (tact >= start && tact < start + length).then(|| u64::from(tact - start))
}

#[test]
fn zero_outside_window_and_periodic_inside() {
    for screen in [ScreenConfiguration::spectrum48(), ScreenConfiguration::spectrum128()] {
        let table = ContentionTable::new(&screen);
        for frame_tact in 0..u64::from(screen.frame_tacts()) {
            let delay = table.get_contention_value(frame_tact);
            match in_window(&screen, frame_tact) {
                None => assert_eq!(delay, 0, "tact {frame_tact}"),
                Some(offset) => {
                    assert_eq!(delay, CONTENTION_PATTERN[(offset % 8) as usize]);
                    if offset + 8 < 126 {
                        assert_eq!(delay, table.get_contention_value(frame_tact + 8));
                    }
                }
            }
        }
    }
}

proptest! {
    #[test]
    fn lookup_is_frame_periodic(tact in 0u64..69_888, frames in 0u64..1_000) {
        let table = ContentionTable::new(&ScreenConfiguration::spectrum48());
        prop_assert_eq!(
            table.get_contention_value(tact),
            table.get_contention_value(tact + frames * 69_888)
        );
    }

    #[test]
    fn io_contention_bounded(tact in 0u64..69_888, ula_port: bool, contended_high: bool) {
        let table = ContentionTable::new(&ScreenConfiguration::spectrum48());
        let delay = table.io_contention(ula_port, contended_high, tact);
        // Four checks can each stall at most one full pattern step.
        prop_assert!(delay <= 4 * 6);
        if !ula_port && !contended_high {
            prop_assert_eq!(delay, 0);
        }
    }
}

#[test]
fn screen_configuration_round_trips_through_json() {
    let screen = ScreenConfiguration::spectrum128();
    let json = serde_json::to_string(&screen).unwrap();
    let decoded: ScreenConfiguration = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, screen);

    // Missing keys take the 48K defaults.
    let partial: ScreenConfiguration = serde_json::from_str(r#"{"display_lines":192}"#).unwrap();
    assert_eq!(partial, ScreenConfiguration::spectrum48());
}
