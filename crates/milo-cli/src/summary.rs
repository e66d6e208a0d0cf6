use std::fmt::Write as _;

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use milo_io::header::FileHeader;
use milo_io::{Directory, Entry, MiloFile, PayloadState, TreeNode, TypeKind, TypeRegistry};
use serde::Serialize;

/// Header and tree counts printed by `milo info`.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub path: String,
    pub compression: String,
    pub endian: String,
    pub platform: String,
    pub start_offset: u32,
    pub blocks: usize,
    pub largest_block: u32,
    pub root_type: String,
    pub root_name: String,
    pub root_revision: u32,
    pub directories: usize,
    pub entries: usize,
    pub parsed: usize,
    pub opaque: usize,
    pub degraded: usize,
}

impl ArchiveSummary {
    #[must_use]
    pub fn new(path: &str, header: &FileHeader, file: &MiloFile) -> Self {
        let mut summary = Self {
            path: path.to_string(),
            compression: file.compression.to_string(),
            endian: file.endian.to_string(),
            platform: file.platform.to_string(),
            start_offset: file.start_offset,
            blocks: header.block_sizes.len(),
            largest_block: header.largest_block,
            root_type: file.root.dir_type.to_string(),
            root_name: file.root.name.to_string(),
            root_revision: file.root.revision,
            directories: 0,
            entries: 0,
            parsed: 0,
            opaque: 0,
            degraded: 0,
        };
        for (_, node) in file.root.walk() {
            match node {
                TreeNode::Directory(_) => summary.directories += 1,
                TreeNode::Entry(entry) => {
                    summary.entries += 1;
                    match entry_state(entry) {
                        "degraded" => summary.degraded += 1,
                        "opaque" => summary.opaque += 1,
                        _ => summary.parsed += 1,
                    }
                }
            }
        }
        summary
    }

    /// Two-column table of the summary fields.
    #[must_use]
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.set_header(vec![header_cell("Field"), header_cell("Value")]);
        apply_table_style(&mut table);
        let rows: [(&str, String); 15] = [
            ("Path", self.path.clone()),
            ("Compression", self.compression.clone()),
            ("Endian", self.endian.clone()),
            ("Platform", self.platform.clone()),
            ("Start offset", format!("{:#x}", self.start_offset)),
            ("Blocks", self.blocks.to_string()),
            ("Largest block", self.largest_block.to_string()),
            ("Root type", self.root_type.clone()),
            ("Root name", self.root_name.clone()),
            ("Root revision", self.root_revision.to_string()),
            ("Directories", self.directories.to_string()),
            ("Entries", self.entries.to_string()),
            ("Parsed", self.parsed.to_string()),
            ("Opaque", self.opaque.to_string()),
            ("Degraded", self.degraded.to_string()),
        ];
        for (label, value) in rows {
            let value_cell = if label == "Degraded" && self.degraded > 0 {
                Cell::new(value).fg(Color::Yellow).add_attribute(Attribute::Bold)
            } else {
                Cell::new(value)
            };
            table.add_row(vec![Cell::new(label).fg(Color::Blue), value_cell]);
        }
        table
    }
}

/// One word describing how an entry will be written.
#[must_use]
pub fn entry_state(entry: &Entry) -> &'static str {
    if entry.payload.error().is_some() {
        return "degraded";
    }
    match entry.payload.state() {
        PayloadState::RawOnly => "opaque",
        PayloadState::Parsed(_) if entry.is_dirty() => "modified",
        PayloadState::Parsed(_) => "parsed",
        PayloadState::Modified(_) => "modified",
    }
}

/// Indented plain-text listing of a directory tree.
#[must_use]
pub fn render_tree(root: &Directory) -> String {
    let mut out = String::new();
    for (depth, node) in root.walk() {
        let indent = "  ".repeat(depth);
        match node {
            TreeNode::Directory(dir) => {
                let _ = writeln!(
                    out,
                    "{indent}{} \"{}\" (rev {}, {} entries)",
                    dir.dir_type,
                    dir.name,
                    dir.revision,
                    dir.len()
                );
            }
            TreeNode::Entry(entry) => {
                let _ = write!(out, "{indent}{} : {}", entry.name, entry.entry_type);
                if let Some(object) = entry.object().filter(|object| !object.is_opaque()) {
                    let _ = write!(out, " r{}", object.revision().revision);
                }
                let _ = write!(out, " [{}]", entry_state(entry));
                if entry.is_proxy() {
                    out.push_str(" proxy");
                }
                out.push('\n');
            }
        }
    }
    out
}

/// Table of registered types with their kind and revisions.
#[must_use]
pub fn types_table(registry: &TypeRegistry) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Type"),
        header_cell("Kind"),
        header_cell("Revisions"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    for name in registry.type_names() {
        let kind = match registry.kind(name) {
            Some(TypeKind::Directory) => "directory",
            _ => "object",
        };
        let revisions = registry
            .revisions(name)
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(name).fg(Color::Blue).add_attribute(Attribute::Bold),
            Cell::new(kind),
            Cell::new(revisions),
        ]);
    }
    table
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}
