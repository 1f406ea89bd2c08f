use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::domain::fallback::fallback_index;
use crate::domain::machine::{Category, Difficulty, MachineDefinition};
use crate::domain::DomainError;

/// Largest page a catalog listing returns.
pub const MAX_PAGE_SIZE: usize = 100;

/// Read-only catalog of known machines.
///
/// Order is the order of the source document and is significant: the offline
/// fallback selects entries by index.
#[derive(Debug, Clone)]
pub struct MachineCatalog {
    machines: Vec<MachineDefinition>,
    index: HashMap<String, usize>,
}

impl MachineCatalog {
    /// Build a catalog, rejecting an empty list and duplicate ids.
    pub fn new(machines: Vec<MachineDefinition>) -> Result<Self, DomainError> {
        if machines.is_empty() {
            return Err(DomainError::Precondition(
                "Machine catalog must contain at least one machine".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(machines.len());
        for (position, machine) in machines.iter().enumerate() {
            if machine.id.trim().is_empty() {
                return Err(DomainError::Precondition(format!(
                    "Machine at position {} has an empty id",
                    position
                )));
            }
            if index.insert(machine.id.clone(), position).is_some() {
                return Err(DomainError::Precondition(format!(
                    "Duplicate machine id '{}'",
                    machine.id
                )));
            }
        }

        Ok(Self { machines, index })
    }

    /// Parse a catalog from its JSON document (an array of definitions).
    pub fn from_json(json: &str) -> Result<Self, DomainError> {
        let machines: Vec<MachineDefinition> = serde_json::from_str(json)
            .map_err(|e| DomainError::Catalog(format!("Failed to parse machine catalog: {}", e)))?;
        Self::new(machines)
    }

    /// Find a machine by ID.
    pub fn get(&self, machine_id: &str) -> Result<&MachineDefinition, DomainError> {
        self.index
            .get(machine_id)
            .map(|&i| &self.machines[i])
            .ok_or_else(|| DomainError::MachineNotFound(machine_id.to_string()))
    }

    pub fn contains(&self, machine_id: &str) -> bool {
        self.index.contains_key(machine_id)
    }

    /// Number of machines; never zero.
    pub fn size(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.machines.len()).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// Machine at a position in catalog order.
    pub fn entry_at(&self, position: usize) -> Option<&MachineDefinition> {
        self.machines.get(position)
    }

    /// Deterministic suggestion for a photo reference, used when the backend is unavailable.
    pub fn fallback_for(&self, reference: &str) -> &MachineDefinition {
        &self.machines[fallback_index(reference, self.size())]
    }

    pub fn iter(&self) -> impl Iterator<Item = &MachineDefinition> {
        self.machines.iter()
    }

    /// List all machine IDs in catalog order.
    pub fn machine_ids(&self) -> Vec<&str> {
        self.machines.iter().map(|m| m.id.as_str()).collect()
    }

    /// Filtered, name-ordered, paginated listing.
    pub fn list(
        &self,
        query: &MachineQuery,
        page: usize,
        page_size: usize,
    ) -> Result<MachinePage, DomainError> {
        if page == 0 {
            return Err(DomainError::Precondition("page starts at 1".to_string()));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(DomainError::Precondition(format!(
                "page_size must be within 1-{}, got {}",
                MAX_PAGE_SIZE, page_size
            )));
        }

        let mut matching: Vec<&MachineDefinition> =
            self.machines.iter().filter(|m| query.matches(m)).collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));

        let total = matching.len();
        let machines = matching
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect();

        Ok(MachinePage {
            machines,
            total,
            page,
            page_size,
        })
    }

    /// Distinct categories present in the catalog, alphabetical by name.
    pub fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self
            .machines
            .iter()
            .map(|m| m.category)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        categories.sort_by_key(|c| c.as_str());
        categories
    }

    /// Distinct difficulties present in the catalog, alphabetical by name.
    pub fn difficulties(&self) -> Vec<Difficulty> {
        let mut difficulties: Vec<Difficulty> = self
            .machines
            .iter()
            .map(|m| m.difficulty)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        difficulties.sort_by_key(|d| d.as_str());
        difficulties
    }
}

/// Filters for a catalog listing. All set filters must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineQuery {
    pub category: Option<Category>,
    pub difficulty: Option<Difficulty>,
    /// Case-insensitive substring of the name or a search keyword.
    pub search: Option<String>,
    /// Every tag must appear among the machine's search keywords.
    pub tags: Vec<String>,
}

impl MachineQuery {
    pub fn matches(&self, machine: &MachineDefinition) -> bool {
        if self.category.is_some_and(|c| c != machine.category) {
            return false;
        }
        if self.difficulty.is_some_and(|d| d != machine.difficulty) {
            return false;
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = machine.name.to_lowercase().contains(&needle)
                || machine
                    .search_keywords
                    .iter()
                    .any(|k| k.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        self.tags.iter().all(|tag| machine.has_keyword(tag))
    }
}

/// One page of a catalog listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachinePage {
    pub machines: Vec<MachineDefinition>,
    /// Matches across all pages.
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn machine(
        id: &str,
        name: &str,
        category: Category,
        keywords: &[&str],
    ) -> MachineDefinition {
        MachineDefinition {
            id: id.to_string(),
            name: name.to_string(),
            category,
            primary_muscles: vec!["quadriceps".to_string()],
            secondary_muscles: vec![],
            difficulty: Difficulty::Beginner,
            setup_steps: vec!["Adjust the seat".to_string()],
            how_to_steps: vec!["Push".to_string()],
            common_mistakes: vec![],
            safety_tips: vec![],
            beginner_tips: vec![],
            search_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            demo_video_url: None,
            muscle_diagram_image: None,
        }
    }

    /// Six machines in fixed order.
    pub(crate) fn sample_catalog() -> MachineCatalog {
        MachineCatalog::new(vec![
            machine("chest-press", "Chest Press Machine", Category::Chest, &["chest", "press"]),
            machine("lat-pulldown", "Lat Pulldown", Category::Back, &["lats", "pulldown"]),
            machine("seated-row", "Seated Cable Row", Category::Back, &["row", "cable"]),
            machine("leg-press", "Seated Leg Press", Category::Legs, &["leg sled", "legs"]),
            machine(
                "shoulder-press",
                "Shoulder Press Machine",
                Category::Shoulders,
                &["overhead press"],
            ),
            machine("treadmill", "Treadmill", Category::Cardio, &["running", "cardio"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let result = MachineCatalog::new(vec![]);
        assert!(matches!(result, Err(DomainError::Precondition(_))));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = MachineCatalog::new(vec![
            machine("leg-press", "Leg Press", Category::Legs, &[]),
            machine("leg-press", "Other Leg Press", Category::Legs, &[]),
        ]);
        assert!(matches!(result, Err(DomainError::Precondition(_))));
    }

    #[test]
    fn test_get_and_not_found() {
        let catalog = sample_catalog();
        assert_eq!(catalog.get("treadmill").unwrap().name, "Treadmill");
        assert!(matches!(
            catalog.get("rowing-machine"),
            Err(DomainError::MachineNotFound(id)) if id == "rowing-machine"
        ));
        assert_eq!(catalog.size().get(), 6);
        assert_eq!(catalog.entry_at(3).unwrap().id, "leg-press");
        assert!(catalog.entry_at(6).is_none());
    }

    #[test]
    fn test_fallback_for_is_stable() {
        let catalog = sample_catalog();
        assert_eq!(catalog.fallback_for("photo-abc").id, "lat-pulldown");
        assert_eq!(catalog.fallback_for("photo-abc").id, "lat-pulldown");
        assert!(catalog.contains(&catalog.fallback_for("file:///tmp/IMG_0001.jpg").id));
    }

    #[test]
    fn test_list_filters_and_orders_by_name() {
        let catalog = sample_catalog();
        let query = MachineQuery {
            category: Some(Category::Back),
            ..Default::default()
        };
        let page = catalog.list(&query, 1, 20).unwrap();
        assert_eq!(page.total, 2);
        let names: Vec<_> = page.machines.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Lat Pulldown", "Seated Cable Row"]);
    }

    #[test]
    fn test_list_search_matches_keywords() {
        let catalog = sample_catalog();
        let query = MachineQuery {
            search: Some("SLED".to_string()),
            ..Default::default()
        };
        let page = catalog.list(&query, 1, 20).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.machines[0].id, "leg-press");
    }

    #[test]
    fn test_list_requires_all_tags() {
        let catalog = sample_catalog();
        let query = MachineQuery {
            tags: vec!["row".to_string(), "cable".to_string()],
            ..Default::default()
        };
        assert_eq!(catalog.list(&query, 1, 20).unwrap().total, 1);

        let query = MachineQuery {
            tags: vec!["row".to_string(), "chest".to_string()],
            ..Default::default()
        };
        assert_eq!(catalog.list(&query, 1, 20).unwrap().total, 0);
    }

    #[test]
    fn test_list_pagination() {
        let catalog = sample_catalog();
        let query = MachineQuery::default();
        let second = catalog.list(&query, 2, 4).unwrap();
        assert_eq!(second.total, 6);
        assert_eq!(second.machines.len(), 2);

        let beyond = catalog.list(&query, 3, 4).unwrap();
        assert!(beyond.machines.is_empty());

        assert!(catalog.list(&query, 0, 4).is_err());
        assert!(catalog.list(&query, 1, 0).is_err());
        assert!(catalog.list(&query, 1, 101).is_err());
    }

    #[test]
    fn test_distinct_values_sorted_by_name() {
        let catalog = sample_catalog();
        assert_eq!(
            catalog.categories(),
            vec![
                Category::Back,
                Category::Cardio,
                Category::Chest,
                Category::Legs,
                Category::Shoulders,
            ]
        );
        assert_eq!(catalog.difficulties(), vec![Difficulty::Beginner]);

        let mixed = MachineCatalog::new(vec![
            MachineDefinition {
                difficulty: Difficulty::Intermediate,
                ..machine("a", "A", Category::Arms, &[])
            },
            MachineDefinition {
                difficulty: Difficulty::Advanced,
                ..machine("b", "B", Category::Core, &[])
            },
            machine("c", "C", Category::Arms, &[]),
        ])
        .unwrap();
        assert_eq!(
            mixed.difficulties(),
            vec![Difficulty::Advanced, Difficulty::Beginner, Difficulty::Intermediate]
        );
        assert_eq!(mixed.categories(), vec![Category::Arms, Category::Core]);
    }
}
