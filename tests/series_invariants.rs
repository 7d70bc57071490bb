//! Property tests for the series-string simulation cycle.

use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use solar_string_monitor::domain::{round1, PanelState, SeriesRecord, StringState, GOOD_THRESHOLD};
use solar_string_monitor::simulation::{simulate, PanelRating};

fn panel_state() -> impl Strategy<Value = Option<PanelState>> {
    prop_oneof![
        Just(None),
        Just(Some(PanelState::Good)),
        Just(Some(PanelState::Repairing)),
        Just(Some(PanelState::Fault)),
    ]
}

fn prior_record() -> impl Strategy<Value = SeriesRecord> {
    (
        prop::collection::vec(prop::option::of(-20.0f64..120.0), 0..24),
        prop::collection::vec(panel_state(), 0..24),
    )
        .prop_map(|(health, states)| SeriesRecord {
            health,
            states,
            ..SeriesRecord::default()
        })
}

fn check_string(state: &StringState, panel_count: usize, rating: PanelRating) {
    assert_eq!(state.panels.len(), panel_count);

    if panel_count == 0 {
        assert_eq!(state.series_health, 100.0);
        assert_eq!(state.series_state, PanelState::Good);
        assert_eq!(state.actual_faulty_index, None);
        return;
    }

    let min = state
        .panels
        .iter()
        .map(|p| p.health)
        .fold(f64::INFINITY, f64::min);
    assert_eq!(state.series_health, min);

    let first_min = state.panels.iter().position(|p| p.health == min);
    if min < GOOD_THRESHOLD {
        assert_eq!(state.actual_faulty_index, first_min);
    } else {
        assert_eq!(state.actual_faulty_index, None);
    }
    assert_eq!(first_min.map(|i| state.panels[i].state), Some(state.series_state));

    if let Some(origin) = state.actual_faulty_index {
        let origin_state = state.panels[origin].state;
        assert!(state.panels[origin..].iter().all(|p| p.state == origin_state));
    }

    let current = state.panels[0].current;
    let (v_low, v_high) = (round1(rating.voltage * 0.98), round1(rating.voltage * 1.02));
    for panel in &state.panels {
        assert!((0.0..=100.0).contains(&panel.health));
        assert_eq!(panel.current, current);
        assert!(panel.voltage >= v_low && panel.voltage <= v_high);
        assert_eq!(panel.power, round1(panel.voltage * panel.current));
    }
    assert!(current <= round1(rating.current));
}

proptest! {
    #[test]
    fn fresh_strings_hold_invariants(seed in any::<u64>(), panel_count in 0usize..40) {
        let rating = PanelRating::new(40.0, 10.0);
        let mut rng = StdRng::seed_from_u64(seed);
        let state = simulate(panel_count, rating, None, &mut rng);
        check_string(&state, panel_count, rating);
        prop_assert!(state.panels.iter().all(|p| p.state == PanelState::Good));
        prop_assert_eq!(state.actual_faulty_index, None);
    }

    #[test]
    fn continued_strings_hold_invariants(
        seed in any::<u64>(),
        panel_count in 0usize..30,
        prior in prior_record(),
        voltage in 1.0f64..60.0,
        current in 0.5f64..15.0,
    ) {
        let rating = PanelRating::new(voltage, current);
        let mut rng = StdRng::seed_from_u64(seed);
        let state = simulate(panel_count, rating, Some(&prior), &mut rng);
        check_string(&state, panel_count, rating);
    }

    #[test]
    fn repeated_cycles_hold_invariants(seed in any::<u64>(), panel_count in 1usize..16) {
        let rating = PanelRating::new(40.0, 10.0);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut record = SeriesRecord::from(simulate(panel_count, rating, None, &mut rng));
        for _ in 0..30 {
            let state = simulate(panel_count, rating, Some(&record), &mut rng);
            check_string(&state, panel_count, rating);
            record = SeriesRecord::from(state);
        }
    }
}
