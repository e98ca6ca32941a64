#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Dashboard,
    Meals,
    Workouts,
    Community,
}

impl Route {
    pub fn title(self) -> &'static str {
        match self {
            Route::Dashboard => "Dashboard",
            Route::Meals => "Meal Tracking",
            Route::Workouts => "Workouts",
            Route::Community => "Community",
        }
    }

    /// Body shown on screens that have no feed. The feed bindings are
    /// silent no-ops here.
    pub fn placeholder(self) -> &'static str {
        match self {
            Route::Dashboard => {
                "Your daily summary lives here.\n\nSwitch to Community to browse and share posts."
            }
            Route::Meals => {
                "Log meals and review your nutrition history here.\n\nSwitch to Community to browse and share posts."
            }
            Route::Workouts => {
                "Track a workout and review past sessions here.\n\nSwitch to Community to browse and share posts."
            }
            Route::Community => "",
        }
    }
}

/// One navigation button. `compose` marks the entry that arms the
/// one-shot composer flag before switching, so the composer opens as
/// soon as the community screen appears.
#[derive(Debug, Clone, Copy)]
pub struct NavEntry {
    pub label: &'static str,
    pub route: Route,
    pub compose: bool,
}

pub const NAV_ENTRIES: [NavEntry; 5] = [
    NavEntry {
        label: "Dashboard",
        route: Route::Dashboard,
        compose: false,
    },
    NavEntry {
        label: "Meal Tracking",
        route: Route::Meals,
        compose: false,
    },
    NavEntry {
        label: "Track a Workout",
        route: Route::Workouts,
        compose: false,
    },
    NavEntry {
        label: "Community",
        route: Route::Community,
        compose: false,
    },
    NavEntry {
        label: "Create a Post",
        route: Route::Community,
        compose: true,
    },
];

pub fn entry(index: usize) -> Option<&'static NavEntry> {
    NAV_ENTRIES.get(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_entry_targets_community() {
        let compose: Vec<_> = NAV_ENTRIES.iter().filter(|entry| entry.compose).collect();
        assert_eq!(compose.len(), 1);
        assert_eq!(compose[0].route, Route::Community);
    }

    #[test]
    fn labels_are_unique() {
        for (i, a) in NAV_ENTRIES.iter().enumerate() {
            for b in &NAV_ENTRIES[i + 1..] {
                assert_ne!(a.label, b.label);
            }
        }
    }

    #[test]
    fn entry_lookup_is_bounds_checked() {
        assert!(entry(0).is_some());
        assert!(entry(NAV_ENTRIES.len()).is_none());
    }
}
