use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;

/// Геометрия окна участника в координатах, понятных потребителю.
///
/// Браузерные писатели публикуют дробные координаты: при разборе любое число
/// округляется до ближайшего целого и зажимается в диапазон типа.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    #[serde(deserialize_with = "rounded_i32")]
    pub x: i32,
    #[serde(deserialize_with = "rounded_i32")]
    pub y: i32,
    #[serde(rename = "w", deserialize_with = "rounded_u32")]
    pub width: u32,
    #[serde(rename = "h", deserialize_with = "rounded_u32")]
    pub height: u32,
}

fn rounded_i32<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    // `as` насыщает: за пределами диапазона получаем MIN/MAX
    Ok(value.round() as i32)
}

fn rounded_u32<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    Ok(value.round() as u32)
}

impl Shape {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Центр прямоугольника: сюда потребитель ставит объект участника
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 * 0.5,
            self.y as f64 + self.height as f64 * 0.5,
        )
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@({},{})", self.width, self.height, self.x, self.y)
    }
}

/// Запись одного живого участника реестра.
///
/// Менять `shape` может только процесс-владелец записи. Хранилище это не
/// проверяет: соглашение "один писатель на запись" держится на доверии.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub id: u64,
    pub shape: Shape,
    /// Непрозрачные данные потребителя, координатор их не разбирает
    #[serde(rename = "metaData", default)]
    pub metadata: serde_json::Value,
}

impl ParticipantRecord {
    pub fn new(id: u64, shape: Shape, metadata: serde_json::Value) -> Self {
        Self { id, shape, metadata }
    }
}

impl fmt::Display for ParticipantRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.shape)
    }
}

/// Упорядоченный список всех зарегистрированных участников.
///
/// Порядок - порядок вставки в глазах того процесса, который записал снимок последним,
/// а не общий логический порядок.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrySnapshot {
    records: Vec<ParticipantRecord>,
}

impl RegistrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Разобрать значение ключа "windows". JSON `null` равен пустому снимку.
    pub fn parse(raw: &str) -> Result<Self> {
        let records: Option<Vec<ParticipantRecord>> = serde_json::from_str(raw)?;
        Ok(Self {
            records: records.unwrap_or_default(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.records)?)
    }

    pub fn records(&self) -> &[ParticipantRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParticipantRecord> {
        self.records.iter()
    }

    pub fn push(&mut self, record: ParticipantRecord) {
        self.records.push(record);
    }

    /// Индекс первой записи с данным id
    pub fn position_of(&self, id: u64) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    pub fn get(&self, id: u64) -> Option<&ParticipantRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut ParticipantRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// Удалить первую запись с данным id
    pub fn remove(&mut self, id: u64) -> Option<ParticipantRecord> {
        self.position_of(id).map(|index| self.records.remove(index))
    }

    /// id участников в порядке снимка
    pub fn ids(&self) -> SmallVec<[u64; 8]> {
        self.records.iter().map(|r| r.id).collect()
    }

    /// Совпадает ли состав участников (по множеству id, порядок не важен)
    pub fn same_membership(&self, other: &RegistrySnapshot) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut ours = self.ids();
        let mut theirs = other.ids();
        ours.sort_unstable();
        theirs.sort_unstable();
        ours == theirs
    }

    /// Убрать повторные id, оставив первое вхождение. Возвращает выброшенные записи.
    pub fn dedup_ids(&mut self) -> Vec<ParticipantRecord> {
        let mut seen = HashSet::with_capacity(self.records.len());
        let mut dropped = Vec::new();
        let mut kept = Vec::with_capacity(self.records.len());
        for record in self.records.drain(..) {
            if seen.insert(record.id) {
                kept.push(record);
            } else {
                dropped.push(record);
            }
        }
        self.records = kept;
        dropped
    }
}

impl From<Vec<ParticipantRecord>> for RegistrySnapshot {
    fn from(records: Vec<ParticipantRecord>) -> Self {
        Self { records }
    }
}

impl<'a> IntoIterator for &'a RegistrySnapshot {
    type Item = &'a ParticipantRecord;
    type IntoIter = std::slice::Iter<'a, ParticipantRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl fmt::Display for RegistrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", record)?;
        }
        write!(f, "]")
    }
}
