//! Start paths for discovery.

/// Paths tried in every archive.
///
/// Most of these are the roots of the game's definition graph. The rest are
/// directories that often survive with a listing even when the root does
/// not.
pub const WELL_KNOWN_SEEDS: &[&str] = &[
    "/",
    "/manifest.sii",
    "/version.sii",
    "/version.txt",
    "/autoexec.cfg",
    "/def",
    "/def/city.sii",
    "/def/country.sii",
    "/def/company.sii",
    "/def/economy_data.sii",
    "/def/bank_data.sii",
    "/def/cargo.sii",
    "/def/climate.sii",
    "/def/env_data.sii",
    "/def/ferry.sii",
    "/def/game_data.sii",
    "/def/online_data.sii",
    "/def/traffic_data.sii",
    "/def/world/prefab.sii",
    "/def/world/model.sii",
    "/def/world/road_look.sii",
    "/def/world/terrain.sii",
    "/def/world/vegetation.sii",
    "/def/world/sign.sii",
    "/def/world/semaphore_profile.sii",
    "/def/world/building.sii",
    "/def/world/curve_model.sii",
    "/def/world/mover.sii",
    "/def/vehicle/truck",
    "/def/vehicle/trailer",
    "/font",
    "/material",
    "/material/ui",
    "/model",
    "/prefab",
    "/sound",
    "/ui",
    "/unit",
    "/vehicle",
];

/// Builds the initial candidate list.
pub(crate) fn initial(extra: &[String], well_known: bool) -> Vec<String> {
    let mut seeds: Vec<String> = Vec::new();
    if well_known {
        seeds.extend(WELL_KNOWN_SEEDS.iter().map(|s| (*s).to_string()));
    } else {
        seeds.push("/".to_string());
    }
    seeds.extend(extra.iter().cloned());
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_always_seeded() {
        assert_eq!(initial(&[], false), vec!["/".to_string()]);
        let seeds = initial(&["/map/europe.mbd".to_string()], true);
        assert_eq!(seeds[0], "/");
        assert_eq!(seeds.last().map(String::as_str), Some("/map/europe.mbd"));
    }

    #[test]
    fn test_well_known_are_absolute() {
        assert!(WELL_KNOWN_SEEDS.iter().all(|s| s.starts_with('/')));
    }
}
