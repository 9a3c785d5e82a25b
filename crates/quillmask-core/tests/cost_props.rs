use proptest::prelude::*;

use quillmask_core::cost::{calculate_jsd, js_distance};
use quillmask_core::profile::NgramProfile;

// Random profiles over a small key space so overlap actually occurs.
prop_compose! {
    fn arb_profile()(
        counts in proptest::collection::btree_map(0u32..64, 1u64..1000, 1..40)
    ) -> NgramProfile {
        NgramProfile::from_counts(counts)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn jsd_is_symmetric(p in arb_profile(), q in arb_profile()) {
        let pq = calculate_jsd(&p, &q);
        let qp = calculate_jsd(&q, &p);
        prop_assert!((pq - qp).abs() < 1e-9, "pq = {pq}, qp = {qp}");
    }

    #[test]
    fn jsd_stays_within_bounds(p in arb_profile(), q in arb_profile()) {
        let jsd = calculate_jsd(&p, &q);
        prop_assert!(jsd >= -1e-12, "jsd = {jsd}");
        prop_assert!(jsd <= 1.0 + 1e-9, "jsd = {jsd}");
    }

    #[test]
    fn self_divergence_vanishes(p in arb_profile()) {
        let jsd = calculate_jsd(&p, &p);
        prop_assert!(jsd.abs() < 1e-9, "jsd = {jsd}");
    }

    #[test]
    fn distance_respects_the_metric_ceiling(p in arb_profile(), q in arb_profile()) {
        let dist = js_distance(calculate_jsd(&p, &q).max(0.0));
        prop_assert!(dist <= std::f64::consts::SQRT_2 + 1e-6);
    }

    #[test]
    fn profile_round_trips_through_serialization(p in arb_profile()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");

        p.save(&path).unwrap();
        let loaded = NgramProfile::load(&path).unwrap();

        prop_assert_eq!(p.n(), loaded.n());
        prop_assert_eq!(p.size(), loaded.size());
        prop_assert_eq!(
            p.iter().collect::<Vec<_>>(),
            loaded.iter().collect::<Vec<_>>()
        );

        // Bit-exact: a second save produces identical bytes.
        let path2 = dir.path().join("profile2.json");
        loaded.save(&path2).unwrap();
        prop_assert_eq!(
            std::fs::read(&path).unwrap(),
            std::fs::read(&path2).unwrap()
        );
    }
}
