/// One of the three row sets a CPU preview carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Section {
    #[default]
    Faults,
    ManualInterventions,
    Warnings,
}

impl Section {
    pub const ALL: [Section; 3] = [
        Section::Faults,
        Section::ManualInterventions,
        Section::Warnings,
    ];

    /// Wire key used by the backend (`data.faults`, `?section=warnings`, ...).
    pub fn key(self) -> &'static str {
        match self {
            Section::Faults => "faults",
            Section::ManualInterventions => "manual_interventions",
            Section::Warnings => "warnings",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Section::Faults => "Faults",
            Section::ManualInterventions => "Manual Interventions",
            Section::Warnings => "Warnings",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.key() == key)
    }
}

/// A table row; cells are aligned with [`PreviewEntry::columns`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreviewRow {
    pub cells: Vec<String>,
}

impl PreviewRow {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    /// Case-insensitive substring match over every cell.
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.cells
            .iter()
            .any(|cell| cell.to_lowercase().contains(needle_lower))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BitUsage {
    pub total: u32,
    pub used: u32,
    pub spare: u32,
    pub spare_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UsageStats {
    pub fault_bits: BitUsage,
    pub manual_intervention_bits: BitUsage,
    pub warning_bits: BitUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionTotals {
    pub faults: usize,
    pub manual_interventions: usize,
    pub warnings: usize,
}

impl SectionTotals {
    pub fn get(&self, section: Section) -> usize {
        match section {
            Section::Faults => self.faults,
            Section::ManualInterventions => self.manual_interventions,
            Section::Warnings => self.warnings,
        }
    }
}

/// Preview of one processed CPU: three labelled row sets plus bit usage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreviewEntry {
    pub columns: Vec<String>,
    pub faults: Vec<PreviewRow>,
    pub manual_interventions: Vec<PreviewRow>,
    pub warnings: Vec<PreviewRow>,
    pub total_rows: SectionTotals,
    pub usage: UsageStats,
}

impl PreviewEntry {
    pub fn rows(&self, section: Section) -> &[PreviewRow] {
        match section {
            Section::Faults => &self.faults,
            Section::ManualInterventions => &self.manual_interventions,
            Section::Warnings => &self.warnings,
        }
    }

    /// Rows of `section` matching `search`; an empty or blank term keeps every row.
    pub fn filter_rows(&self, section: Section, search: &str) -> Vec<&PreviewRow> {
        let needle = search.trim().to_lowercase();
        let rows = self.rows(section);
        if needle.is_empty() {
            return rows.iter().collect();
        }
        rows.iter().filter(|row| row.matches(&needle)).collect()
    }
}
