use std::error::Error;

use serde::{Deserialize, Serialize};

use dbgate_core::domain::EntityType;
use dbgate_core::impls::RuleMapper;
use dbgate_core::observability::init_tracing;
use dbgate_core::{DataAccess, DataAccessConfig, Model, Query, Response};

#[derive(Debug, Clone, Serialize)]
struct Customer {
    id: i64,
    name: String,
    age: u32,
}

#[derive(Debug, Deserialize)]
struct NewCustomer {
    name: String,
    age: u32,
}

#[derive(Debug, Default)]
struct CustomerPatch {
    name: Option<String>,
    age: Option<u32>,
}

#[derive(Debug, Default, Serialize)]
struct CustomerSummary {
    id: i64,
    label: String,
}

fn model() -> Model {
    Model::builder()
        .entity(EntityType::<Customer>::new("Customer").sequence_key(
            "id",
            |c| c.id,
            |c, id| c.id = id,
        ))
        .build()
}

fn rules() -> RuleMapper {
    RuleMapper::builder()
        .rule(|n: &NewCustomer| Customer {
            id: 0,
            name: n.name.clone(),
            age: n.age,
        })
        .merge(|p: &CustomerPatch, c: &mut Customer| {
            if let Some(name) = &p.name {
                c.name = name.clone();
            }
            if let Some(age) = p.age {
                c.age = age;
            }
        })
        .rule(|c: &Customer| CustomerSummary {
            id: c.id,
            label: format!("{} ({})", c.name, c.age),
        })
        .build()
}

/// 各ステップの envelope を JSON で表示
fn show<T: Serialize>(step: &str, response: &Response<T>) -> Result<(), serde_json::Error> {
    println!("== {step}");
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    // (A) 設定: 第 1 引数があれば JSON 設定ファイルとして読む
    let config = match std::env::args().nth(1) {
        Some(path) => DataAccessConfig::from_path(path)?,
        None => DataAccessConfig::default(),
    };
    init_tracing(&config.log_filter)?;

    // (B) ワイヤリング
    let access = DataAccess::in_memory(model(), rules(), config)?;
    tracing::info!(store = access.factory().name(), "data access ready");

    // (C) 1 つの unit of work でシナリオを実行
    let mut svc = access.scope()?;

    let seed: Vec<NewCustomer> = serde_json::from_str(
        r#"[{"name": "Ada", "age": 36}, {"name": "Brook", "age": 17}, {"name": "Cyd", "age": 52}]"#,
    )?;
    for input in &seed {
        let created: Response<Customer> = svc.add_object(input);
        show("create", &created)?;
    }

    show("read", &svc.get_entity::<Customer>(1))?;
    show("read missing", &svc.get_entity::<Customer>(99))?;

    let patch = CustomerPatch {
        name: Some("Ada L.".to_string()),
        ..CustomerPatch::default()
    };
    show("update", &svc.update_object::<_, Customer>(&patch, 1))?;

    let adults = Query::all()
        .filter("age >= 18", |c: &Customer| c.age >= 18)
        .order_by("name", |c: &Customer| c.name.clone());
    show(
        "summaries",
        &svc.get_objects_by_query::<Customer, CustomerSummary>(&adults),
    )?;

    show("remove", &svc.remove_entity::<Customer>(2))?;
    show("read removed", &svc.get_entity::<Customer>(2))?;

    let nobody = Query::all().filter("age > 200", |c: &Customer| c.age > 200);
    show("empty query", &svc.get_entities_by_query(&nobody))?;

    tracing::info!(counts = ?svc.tracker_counts(), "scenario finished");
    Ok(())
}
