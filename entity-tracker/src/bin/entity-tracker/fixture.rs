//! Scenario files replayed by the CLI.
//!
//! A fixture declares entity classes and an ordered list of steps:
//!
//! ```toml
//! [tracker]
//! eligibility = "initialized"
//!
//! [[class]]
//! name = "Book"
//! fields = ["title"]
//! markers = ["tracked"]
//! association = [{ name = "author", target = "Author", kind = "many_to_one" }]
//!
//! [[step]]
//! action = "new"
//! alias = "hobbit"
//! class = "Book"
//! values = { title = "The Hobbit" }
//! ```

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use entity_tracker::{
    AssociationKind, AssociationMapping, ClassMetadata, IdGenerator, MarkerRegistry, MemoryEntityManager,
    TrackerConfig, Value,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default, rename = "class")]
    pub classes: Vec<ClassSpec>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassSpec {
    pub name: String,
    /// Root of the inheritance hierarchy, when not the class itself.
    pub root: Option<String>,
    #[serde(default = "default_identifier")]
    pub id: Vec<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub generator: IdGenerator,
    #[serde(default)]
    pub markers: Vec<String>,
    #[serde(default, rename = "association")]
    pub associations: Vec<AssociationSpec>,
}

fn default_identifier() -> Vec<String> {
    vec!["id".to_string()]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationSpec {
    pub name: String,
    pub target: String,
    pub kind: AssociationKind,
    /// Set on the inverse side: the owning field on the target.
    pub mapped_by: Option<String>,
    pub inversed_by: Option<String>,
    #[serde(default)]
    pub cascade_persist: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    New {
        alias: String,
        class: String,
        #[serde(default)]
        values: toml::Table,
    },
    /// Writes a scalar field; a missing value clears it.
    Set {
        alias: String,
        field: String,
        value: Option<toml::Value>,
    },
    /// Points a to-one association at `target` or appends to a to-many one.
    Link {
        alias: String,
        field: String,
        target: String,
    },
    /// Clears a to-one association or drops `target` from a to-many one.
    Unlink {
        alias: String,
        field: String,
        target: Option<String>,
    },
    Persist {
        alias: String,
    },
    Detach {
        alias: String,
    },
    Remove {
        alias: String,
    },
    Flush,
}

impl Step {
    pub fn describe(&self) -> String {
        match self {
            Step::New { alias, class, .. } => format!("new {class} as {alias}"),
            Step::Set { alias, field, .. } => format!("set {alias}.{field}"),
            Step::Link { alias, field, target } => format!("link {alias}.{field} to {target}"),
            Step::Unlink { alias, field, .. } => format!("unlink {alias}.{field}"),
            Step::Persist { alias } => format!("persist {alias}"),
            Step::Detach { alias } => format!("detach {alias}"),
            Step::Remove { alias } => format!("remove {alias}"),
            Step::Flush => "flush".to_string(),
        }
    }
}

impl AssociationSpec {
    fn to_mapping(&self) -> Result<AssociationMapping> {
        let (name, target) = (self.name.as_str(), self.target.as_str());
        let mut mapping = match (self.kind, self.mapped_by.as_deref()) {
            (AssociationKind::ManyToOne, None) => AssociationMapping::many_to_one(name, target),
            (AssociationKind::OneToOne, None) => AssociationMapping::one_to_one(name, target),
            (AssociationKind::OneToOne, Some(owner)) => AssociationMapping::one_to_one_inverse(name, target, owner),
            (AssociationKind::OneToMany, Some(owner)) => AssociationMapping::one_to_many(name, target, owner),
            (AssociationKind::ManyToMany, None) => AssociationMapping::many_to_many(name, target),
            (AssociationKind::ManyToMany, Some(owner)) => AssociationMapping::many_to_many_inverse(name, target, owner),
            (AssociationKind::ManyToOne, Some(_)) => bail!("many_to_one '{name}' is always the owning side"),
            (AssociationKind::OneToMany, None) => bail!("one_to_many '{name}' needs mapped_by"),
        };
        if let Some(field) = &self.inversed_by {
            mapping = mapping.counterpart(field);
        }
        if self.cascade_persist {
            mapping = mapping.cascade_persist();
        }
        Ok(mapping)
    }
}

impl ClassSpec {
    pub fn is_tracked(&self) -> bool {
        self.markers.iter().any(|marker| marker == "tracked")
    }

    fn to_metadata(&self) -> Result<ClassMetadata> {
        let mut metadata = ClassMetadata::new(&self.name).generator(self.generator);
        if let Some(root) = &self.root {
            metadata = metadata.root(root);
        }
        for field in &self.id {
            metadata = metadata.id(field);
        }
        for field in &self.fields {
            metadata = metadata.field(field);
        }
        for association in &self.associations {
            let mapping = association
                .to_mapping()
                .with_context(|| format!("class '{}'", self.name))?;
            metadata = metadata.association(mapping);
        }
        Ok(metadata)
    }
}

/// Counts gathered while validating a fixture.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FixtureSummary {
    pub classes: Vec<String>,
    pub tracked: Vec<String>,
    pub steps: usize,
    pub flushes: usize,
}

impl Fixture {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("failed to parse fixture")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&source).with_context(|| format!("in {}", path.display()))
    }

    /// Context with every declared class registered, plus the marker registry.
    pub fn build(&self) -> Result<(MemoryEntityManager, MarkerRegistry)> {
        let mut em = MemoryEntityManager::new();
        let mut registry = MarkerRegistry::new();
        for class in &self.classes {
            em.register(class.to_metadata()?);
            for marker in &class.markers {
                match marker.as_str() {
                    "tracked" => {
                        registry.track(&class.name);
                    }
                    other => bail!("class '{}' uses unknown marker '{other}'", class.name),
                }
            }
        }
        Ok((em, registry))
    }

    /// Checks classes and steps without running anything.
    pub fn validate(&self) -> Result<FixtureSummary> {
        self.build()?;

        let classes: HashMap<&str, &ClassSpec> = self.classes.iter().map(|class| (class.name.as_str(), class)).collect();
        if classes.len() != self.classes.len() {
            bail!("a class is declared twice");
        }
        for class in &self.classes {
            if class.id.is_empty() {
                bail!("class '{}' declares no identifier", class.name);
            }
            for association in &class.associations {
                if !classes.contains_key(association.target.as_str()) {
                    bail!(
                        "association '{}.{}' targets undeclared class '{}'",
                        class.name,
                        association.name,
                        association.target
                    );
                }
            }
        }

        let mut aliases: HashMap<&str, &ClassSpec> = HashMap::new();
        for (index, step) in self.steps.iter().enumerate() {
            let position = || format!("step {} ({})", index + 1, step.describe());
            match step {
                Step::New { alias, class, values } => {
                    let spec = classes
                        .get(class.as_str())
                        .copied()
                        .ok_or_else(|| anyhow!("unknown class '{class}'"))
                        .with_context(position)?;
                    for field in values.keys() {
                        ensure_scalar(spec, field).with_context(position)?;
                    }
                    if aliases.insert(alias.as_str(), spec).is_some() {
                        return Err(anyhow!("alias '{alias}' is already bound")).with_context(position);
                    }
                }
                Step::Set { alias, field, .. } => {
                    let spec = lookup(&aliases, alias).with_context(position)?;
                    ensure_scalar(spec, field).with_context(position)?;
                }
                Step::Link { alias, field, target } => {
                    let spec = lookup(&aliases, alias).with_context(position)?;
                    ensure_association(spec, field).with_context(position)?;
                    lookup(&aliases, target).with_context(position)?;
                }
                Step::Unlink { alias, field, target } => {
                    let spec = lookup(&aliases, alias).with_context(position)?;
                    let association = ensure_association(spec, field).with_context(position)?;
                    match target {
                        Some(target) => {
                            lookup(&aliases, target).with_context(position)?;
                        }
                        None if association.kind.is_to_many() => {
                            return Err(anyhow!("to-many '{field}' needs a target to unlink")).with_context(position);
                        }
                        None => {}
                    }
                }
                Step::Persist { alias } | Step::Detach { alias } | Step::Remove { alias } => {
                    lookup(&aliases, alias).with_context(position)?;
                }
                Step::Flush => {}
            }
        }

        Ok(FixtureSummary {
            classes: self.classes.iter().map(|class| class.name.clone()).collect(),
            tracked: self
                .classes
                .iter()
                .filter(|class| class.is_tracked())
                .map(|class| class.name.clone())
                .collect(),
            steps: self.steps.len(),
            flushes: self.steps.iter().filter(|step| matches!(step, Step::Flush)).count(),
        })
    }
}

fn lookup<'a>(aliases: &HashMap<&str, &'a ClassSpec>, alias: &str) -> Result<&'a ClassSpec> {
    aliases
        .get(alias)
        .copied()
        .ok_or_else(|| anyhow!("alias '{alias}' is used before it is created"))
}

fn ensure_scalar(spec: &ClassSpec, field: &str) -> Result<()> {
    if spec.id.iter().chain(&spec.fields).any(|name| name == field) {
        Ok(())
    } else {
        bail!("class '{}' has no field '{field}'", spec.name)
    }
}

fn ensure_association<'a>(spec: &'a ClassSpec, field: &str) -> Result<&'a AssociationSpec> {
    spec.associations
        .iter()
        .find(|association| association.name == field)
        .ok_or_else(|| anyhow!("class '{}' has no association '{field}'", spec.name))
}

/// Scalar value of a TOML literal. Arrays and tables become shared objects.
pub fn to_value(value: &toml::Value) -> Result<Value> {
    Ok(match value {
        toml::Value::String(text) => Value::from(text.as_str()),
        toml::Value::Integer(int) => Value::Int(*int),
        toml::Value::Float(float) => Value::Float(*float),
        toml::Value::Boolean(flag) => Value::Bool(*flag),
        toml::Value::Datetime(datetime) => {
            let parsed: DateTime<Utc> = datetime
                .to_string()
                .parse()
                .with_context(|| format!("datetime '{datetime}' needs a date, a time and an offset"))?;
            Value::DateTime(parsed)
        }
        toml::Value::Array(_) | toml::Value::Table(_) => Value::from_json(&serde_json::to_value(value)?),
    })
}
