//! Resource addresses, column contracts and query results.

use std::fmt;

use pebblekit_codec::{ConnectedWatch, WatchIdentifier, Watchapp, WatchappType};
use tracing::warn;
use uuid::Uuid;

use crate::error::{ProviderError, Result};

pub const CONNECTED_WATCHES_PATH: &str = "connectedWatches";
pub const ACTIVE_APP_PATH: &str = "activeApp";

/// Address of a queryable table. Change notifications are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    ConnectedWatches,
    ActiveApp(WatchIdentifier),
}

impl Resource {
    /// Parse `connectedWatches` or `activeApp/{id}`.
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments = path.trim_matches('/').split('/');
        match (segments.next(), segments.next()) {
            (Some(CONNECTED_WATCHES_PATH), None) => Ok(Resource::ConnectedWatches),
            (Some(ACTIVE_APP_PATH), Some(id)) if !id.is_empty() => {
                Ok(Resource::ActiveApp(WatchIdentifier::from(id)))
            }
            _ => Err(ProviderError::UnknownResource(path.to_string())),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Resource::ConnectedWatches => CONNECTED_WATCHES_PATH.to_string(),
            Resource::ActiveApp(id) => format!("{ACTIVE_APP_PATH}/{id}"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A column of one of the provider tables.
pub trait Column: Copy + Sized + 'static {
    /// Every column, in contract order.
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|column| column.name() == name)
    }

    /// Filter a requested projection down to known columns.
    ///
    /// No projection (or an empty one) selects every column.
    fn project(projection: Option<&[&str]>) -> Vec<Self> {
        match projection {
            Some(requested) if !requested.is_empty() => {
                requested.iter().filter_map(|name| Self::from_name(name)).collect()
            }
            _ => Self::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectedWatchColumn {
    Id,
    Name,
    Platform,
    Revision,
    FirmwareVersionMajor,
    FirmwareVersionMinor,
    FirmwareVersionPatch,
    FirmwareVersionTag,
}

impl Column for ConnectedWatchColumn {
    const ALL: &'static [Self] = &[
        ConnectedWatchColumn::Id,
        ConnectedWatchColumn::Name,
        ConnectedWatchColumn::Platform,
        ConnectedWatchColumn::Revision,
        ConnectedWatchColumn::FirmwareVersionMajor,
        ConnectedWatchColumn::FirmwareVersionMinor,
        ConnectedWatchColumn::FirmwareVersionPatch,
        ConnectedWatchColumn::FirmwareVersionTag,
    ];

    fn name(self) -> &'static str {
        match self {
            ConnectedWatchColumn::Id => "ID",
            ConnectedWatchColumn::Name => "NAME",
            ConnectedWatchColumn::Platform => "PLATFORM",
            ConnectedWatchColumn::Revision => "REVISION",
            ConnectedWatchColumn::FirmwareVersionMajor => "FIRMWARE_VERSION_MAJOR",
            ConnectedWatchColumn::FirmwareVersionMinor => "FIRMWARE_VERSION_MINOR",
            ConnectedWatchColumn::FirmwareVersionPatch => "FIRMWARE_VERSION_PATCH",
            ConnectedWatchColumn::FirmwareVersionTag => "FIRMWARE_VERSION_TAG",
        }
    }
}

impl ConnectedWatchColumn {
    pub fn cell(self, watch: &ConnectedWatch) -> Cell {
        match self {
            ConnectedWatchColumn::Id => Cell::Text(watch.id.to_string()),
            ConnectedWatchColumn::Name => Cell::Text(watch.name.clone()),
            ConnectedWatchColumn::Platform => Cell::Text(watch.platform.clone()),
            ConnectedWatchColumn::Revision => Cell::Text(watch.revision.clone()),
            ConnectedWatchColumn::FirmwareVersionMajor => Cell::from(watch.firmware_major),
            ConnectedWatchColumn::FirmwareVersionMinor => Cell::from(watch.firmware_minor),
            ConnectedWatchColumn::FirmwareVersionPatch => Cell::from(watch.firmware_patch),
            ConnectedWatchColumn::FirmwareVersionTag => watch
                .firmware_tag
                .clone()
                .map_or(Cell::Null, Cell::Text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActiveAppColumn {
    Id,
    Name,
    Type,
}

impl Column for ActiveAppColumn {
    const ALL: &'static [Self] = &[
        ActiveAppColumn::Id,
        ActiveAppColumn::Name,
        ActiveAppColumn::Type,
    ];

    fn name(self) -> &'static str {
        match self {
            ActiveAppColumn::Id => "ID",
            ActiveAppColumn::Name => "NAME",
            ActiveAppColumn::Type => "TYPE",
        }
    }
}

impl ActiveAppColumn {
    pub fn cell(self, app: &Watchapp) -> Cell {
        match self {
            ActiveAppColumn::Id => Cell::Text(app.id.to_string()),
            ActiveAppColumn::Name => app.name.clone().map_or(Cell::Null, Cell::Text),
            ActiveAppColumn::Type => Cell::Integer(app.app_type.code()),
        }
    }
}

/// A single table value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Null,
}

impl Cell {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Cell::Integer(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Cell::Integer(i64::from(value))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(text) => f.write_str(text),
            Cell::Integer(value) => write!(f, "{value}"),
            Cell::Null => f.write_str("null"),
        }
    }
}

/// Query result: named columns and rows of cells in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn connected_watches(
        watches: &[ConnectedWatch],
        columns: &[ConnectedWatchColumn],
    ) -> Self {
        Self {
            columns: columns.iter().map(|c| c.name()).collect(),
            rows: watches
                .iter()
                .map(|watch| columns.iter().map(|c| c.cell(watch)).collect())
                .collect(),
        }
    }

    pub fn active_app(app: Option<&Watchapp>, columns: &[ActiveAppColumn]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.name()).collect(),
            rows: app
                .map(|app| columns.iter().map(|c| c.cell(app)).collect())
                .into_iter()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| *column == name)
    }

    /// Cell at `row` in the named column.
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    /// Rebuild watches from a full-projection table. Malformed rows are skipped.
    pub fn to_connected_watches(&self) -> Vec<ConnectedWatch> {
        (0..self.rows.len())
            .filter_map(|row| {
                let watch = self.watch_at(row);
                if watch.is_none() {
                    warn!(row, "skipping malformed connected watch row");
                }
                watch
            })
            .collect()
    }

    /// Rebuild the active app from a full-projection table.
    pub fn to_active_app(&self) -> Option<Watchapp> {
        if self.rows.is_empty() {
            return None;
        }
        let id = self.text(0, ActiveAppColumn::Id)?;
        let id = match Uuid::parse_str(id) {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, "active app row has a malformed id");
                return None;
            }
        };
        Some(Watchapp {
            id,
            name: self.text(0, ActiveAppColumn::Name).map(str::to_string),
            app_type: self
                .integer(0, ActiveAppColumn::Type)
                .map_or(WatchappType::Unknown, WatchappType::from_code),
        })
    }

    fn watch_at(&self, row: usize) -> Option<ConnectedWatch> {
        use ConnectedWatchColumn as C;
        let firmware = |column: C| {
            self.integer(row, column)
                .and_then(|value| u32::try_from(value).ok())
        };
        Some(ConnectedWatch {
            id: WatchIdentifier::from(self.text(row, C::Id)?),
            name: self.text(row, C::Name)?.to_string(),
            platform: self.text(row, C::Platform)?.to_string(),
            revision: self.text(row, C::Revision)?.to_string(),
            firmware_major: firmware(C::FirmwareVersionMajor)?,
            firmware_minor: firmware(C::FirmwareVersionMinor)?,
            firmware_patch: firmware(C::FirmwareVersionPatch)?,
            firmware_tag: self.text(row, C::FirmwareVersionTag).map(str::to_string),
        })
    }

    fn text(&self, row: usize, column: impl Column) -> Option<&str> {
        self.get(row, column.name())?.as_text()
    }

    fn integer(&self, row: usize, column: impl Column) -> Option<i64> {
        self.get(row, column.name())?.as_integer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watch() -> ConnectedWatch {
        ConnectedWatch {
            id: "watch-1".into(),
            name: "Pebble Time Steel".into(),
            platform: "basalt".into(),
            revision: "snowy_s3".into(),
            firmware_major: 4,
            firmware_minor: 4,
            firmware_patch: 3,
            firmware_tag: Some("rebble".into()),
        }
    }

    #[test]
    fn parse_paths() {
        assert_eq!(
            Resource::parse("connectedWatches"),
            Ok(Resource::ConnectedWatches)
        );
        assert_eq!(
            Resource::parse("activeApp/watch-1"),
            Ok(Resource::ActiveApp("watch-1".into()))
        );
        assert_eq!(
            Resource::parse("/activeApp/watch-1/"),
            Ok(Resource::ActiveApp("watch-1".into()))
        );
        for bad in ["activeApp", "activeApp/", "batteryLevel", "", "connectedWatches/x"] {
            assert!(
                matches!(Resource::parse(bad), Err(ProviderError::UnknownResource(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn path_roundtrip() {
        let resource = Resource::ActiveApp("watch-9".into());
        assert_eq!(resource.path(), "activeApp/watch-9");
        assert_eq!(Resource::parse(&resource.path()), Ok(resource));
    }

    #[test]
    fn projection_filters_unknown_columns() {
        let columns = ConnectedWatchColumn::project(Some(&["NAME", "BATTERY", "ID"]));
        assert_eq!(
            columns,
            vec![ConnectedWatchColumn::Name, ConnectedWatchColumn::Id]
        );
        assert_eq!(
            ConnectedWatchColumn::project(None).len(),
            ConnectedWatchColumn::ALL.len()
        );
        assert_eq!(ActiveAppColumn::project(Some(&[])), ActiveAppColumn::ALL.to_vec());
    }

    #[test]
    fn connected_watch_table_roundtrip() {
        let table = Table::connected_watches(&[watch()], ConnectedWatchColumn::ALL);
        assert_eq!(table.get(0, "PLATFORM"), Some(&Cell::Text("basalt".into())));
        assert_eq!(table.get(0, "FIRMWARE_VERSION_PATCH"), Some(&Cell::Integer(3)));
        assert_eq!(table.to_connected_watches(), vec![watch()]);
    }

    #[test]
    fn partial_projection_cannot_rebuild_watches() {
        let table = Table::connected_watches(&[watch()], &[ConnectedWatchColumn::Id]);
        assert_eq!(table.columns, vec!["ID"]);
        assert!(table.to_connected_watches().is_empty());
    }

    #[test]
    fn active_app_table() {
        let app = Watchapp {
            id: Uuid::nil(),
            name: None,
            app_type: WatchappType::Watchface,
        };
        let table = Table::active_app(Some(&app), ActiveAppColumn::ALL);
        assert_eq!(table.get(0, "NAME"), Some(&Cell::Null));
        assert_eq!(table.get(0, "TYPE"), Some(&Cell::Integer(0)));
        assert_eq!(table.to_active_app(), Some(app));

        let empty = Table::active_app(None, ActiveAppColumn::ALL);
        assert!(empty.is_empty());
        assert_eq!(empty.to_active_app(), None);
    }
}
