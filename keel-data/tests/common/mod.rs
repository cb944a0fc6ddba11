#![allow(dead_code)]

use keel_data::{Entity, MemoryRepository, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Employee {
    pub id: i64,
    pub last_name: String,
    pub hours: i64,
    pub manager: Option<String>,
}

impl Employee {
    pub fn new(id: i64, last_name: &str, hours: i64) -> Self {
        Self {
            id,
            last_name: last_name.to_string(),
            hours,
            manager: None,
        }
    }

    pub fn managed_by(mut self, manager: &str) -> Self {
        self.manager = Some(manager.to_string());
        self
    }
}

impl Entity for Employee {
    type Id = i64;

    fn table_name() -> &'static str {
        "employees"
    }

    fn id_column() -> &'static str {
        "id"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "last_name", "hours", "manager"]
    }

    fn id(&self) -> &i64 {
        &self.id
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(self.id.into()),
            "last_name" => Some(self.last_name.as_str().into()),
            "hours" => Some(self.hours.into()),
            "manager" => Some(self.manager.clone().into()),
            _ => None,
        }
    }
}

/// Twelve employees; hours repeat so that `id` is needed as a tie-breaker.
pub fn staff() -> Vec<Employee> {
    vec![
        Employee::new(1, "Adams", 40),
        Employee::new(2, "Baker", 32).managed_by("Adams"),
        Employee::new(3, "Clark", 40).managed_by("Adams"),
        Employee::new(4, "Duke Ellis", 20),
        Employee::new(5, "Duke Nukem", 45).managed_by("Clark"),
        Employee::new(6, "Evans", 32),
        Employee::new(7, "Fischer", 38).managed_by("Clark"),
        Employee::new(8, "Garcia", 40),
        Employee::new(9, "Hughes", 25),
        Employee::new(10, "Ito", 45).managed_by("Adams"),
        Employee::new(11, "jones", 30),
        Employee::new(12, "Khan", 38),
    ]
}

pub async fn seeded() -> MemoryRepository<Employee> {
    let repo = MemoryRepository::new();
    repo.seed(staff()).await;
    repo
}

pub fn ids(employees: &[Employee]) -> Vec<i64> {
    employees.iter().map(|e| e.id).collect()
}
