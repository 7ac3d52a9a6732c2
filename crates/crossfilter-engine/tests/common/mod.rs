#![allow(dead_code)]

use crossfilter_engine::Crossfilter;
use crossfilter_store::{FieldSchema, FieldType, RawRow, Record, Schema, Value};

pub fn raw(fields: &[(&str, &str)]) -> RawRow {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Plain record type for tests that do not go through the store.
#[derive(Clone, Debug, PartialEq)]
pub struct Person {
    pub name: &'static str,
    pub age: u32,
    pub sex: &'static str,
    pub total: f64,
}

pub fn person(name: &'static str, age: u32, sex: &'static str, total: f64) -> Person {
    Person {
        name,
        age,
        sex,
        total,
    }
}

pub fn people() -> Vec<Person> {
    vec![
        person("ana", 20, "F", 4.0),
        person("luis", 35, "M", 7.0),
        person("eva", 20, "F", 1.5),
        person("juan", 50, "M", 3.0),
        person("rosa", 35, "F", 9.0),
        person("pablo", 65, "M", 2.5),
    ]
}

pub fn migration_schema() -> Schema {
    Schema::new(vec![
        FieldSchema::new("age", FieldType::Integer),
        FieldSchema::new("sex", FieldType::Text),
        FieldSchema::new("total", FieldType::Integer),
    ])
    .unwrap()
}

/// The three-record migration dataset: totals 5, 3 and 2.
pub fn migration() -> Crossfilter<Record> {
    Crossfilter::load(
        migration_schema(),
        vec![
            raw(&[("age", "20"), ("sex", "M"), ("total", "5")]),
            raw(&[("age", "30"), ("sex", "F"), ("total", "3")]),
            raw(&[("age", "20"), ("sex", "F"), ("total", "2")]),
        ],
    )
    .unwrap()
}

pub fn budget_schema() -> Schema {
    Schema::new(vec![
        FieldSchema::new("municipality", FieldType::Text),
        FieldSchema::new("budget", FieldType::Number),
        FieldSchema::new("population", FieldType::Integer),
    ])
    .unwrap()
    .with_derived("per_inhabitant", |r: &Record| {
        match (r.number("budget"), r.number("population")) {
            (Some(budget), Some(population)) if population > 0.0 => {
                Value::from(budget / population)
            }
            _ => Value::Null,
        }
    })
    .unwrap()
}

pub fn number(record: &Record, field: &str) -> f64 {
    record.number(field).unwrap_or(0.0)
}

pub fn key(record: &Record, field: &str) -> Value {
    record.get(field).cloned().unwrap_or_default()
}
