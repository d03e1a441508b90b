//! Section filtering by kind and by qualified table name.

use tracing::debug;

use crate::sieve::parser::Section;
use crate::sieve::{Options, SectionKind, SieveError};
use crate::util::NameFilter;

pub struct SectionFilter {
    sections: Vec<SectionKind>,
    exclude_sections: Vec<SectionKind>,
    tables: NameFilter,
}

impl SectionFilter {
    pub fn new(options: &Options) -> Result<SectionFilter, SieveError> {
        Ok(SectionFilter {
            sections: options.sections.clone(),
            exclude_sections: options.exclude_sections.clone(),
            tables: NameFilter::new(&options.table, &options.exclude_table)?,
        })
    }

    fn excluded_kind(&self, kind: SectionKind) -> bool {
        if !self.sections.is_empty() && !self.sections.contains(&kind) {
            debug!(kind = kind.as_str(), "section kind not in include list");
            return true;
        }
        if self.exclude_sections.contains(&kind) {
            debug!(kind = kind.as_str(), "section kind excluded");
            return true;
        }
        false
    }

    fn excluded_table(&self, section: &Section<'_, '_>) -> bool {
        let Some(identifier) = section.qualified_name() else {
            // no database context, table filters do not apply
            return false;
        };
        if self.tables.excluded(&identifier) {
            debug!(%identifier, "filtered by table pattern");
            return true;
        }
        false
    }

    pub fn excluded(&self, section: &Section<'_, '_>) -> bool {
        self.excluded_kind(section.kind) || self.excluded_table(section)
    }
}
