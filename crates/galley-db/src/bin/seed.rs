//! # Demo Tenant Seeder
//!
//! Populates a database with a small restaurant for development: a pantry
//! of ingredients, a handful of recipes, one received purchase order and a
//! week of sales. Finishes by printing the menu-engineering report.
//!
//! ## Usage
//! ```bash
//! # Seed ./galley_dev.db for tenant "demo"
//! cargo run -p galley-db --bin seed
//!
//! # Specify database path and tenant
//! cargo run -p galley-db --bin seed -- --db ./data/galley.db --tenant bistro
//! ```

use std::collections::HashMap;
use std::env;

use chrono::{Duration, Utc};
use galley_db::{
    Database, DbConfig, Engine, EngineConfig, NewIngredient, NewPurchaseOrder, NewRecipe, SaleInput, WasteInput,
};
use tracing_subscriber::EnvFilter;

/// (name, unit, price per format in cents, format quantity, opening stock, minimum)
const PANTRY: &[(&str, &str, i64, Option<f64>, f64, f64)] = &[
    ("Flour", "kg", 1250, Some(25.0), 20.0, 5.0),
    ("Tomato", "kg", 320, None, 8.0, 3.0),
    ("Mozzarella", "kg", 1150, None, 4.0, 2.0),
    ("Olive Oil", "l", 4500, Some(5.0), 3.0, 1.0),
    ("Basil", "kg", 2400, None, 0.5, 0.2),
    ("Beef Mince", "kg", 1390, None, 6.0, 2.0),
    ("Burger Bun", "unit", 45, None, 60.0, 20.0),
    ("Potato", "kg", 180, None, 25.0, 10.0),
];

/// (name, portions, sell price in cents, [(ingredient, quantity per batch)])
const MENU: &[(&str, i64, i64, &[(&str, f64)])] = &[
    (
        "Margherita",
        4,
        1100,
        &[("Flour", 1.0), ("Tomato", 0.6), ("Mozzarella", 0.5), ("Olive Oil", 0.05), ("Basil", 0.02)],
    ),
    ("Burger", 1, 1450, &[("Beef Mince", 0.18), ("Burger Bun", 1.0), ("Tomato", 0.03)]),
    ("Fries", 1, 450, &[("Potato", 0.3), ("Olive Oil", 0.02)]),
    ("Bruschetta", 2, 750, &[("Flour", 0.15), ("Tomato", 0.2), ("Basil", 0.01), ("Olive Oil", 0.02)]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./galley_dev.db");
    let mut tenant = String::from("demo");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-d" | "--db" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "-t" | "--tenant" => {
                if i + 1 < args.len() {
                    tenant = args[i + 1].clone();
                    i += 1;
                }
            }
            "-h" | "--help" => {
                println!("Galley Demo Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./galley_dev.db)");
                println!("  -t, --tenant <ID>    Tenant id to seed (default: demo)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Galley Demo Seeder");
    println!("==================");
    println!("Database: {}", db_path);
    println!("Tenant:   {}", tenant);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let engine = Engine::new(db, EngineConfig::default());
    engine.spawn_default_subscribers();

    let existing = engine.db().ingredients().list(&tenant, true).await?;
    if !existing.is_empty() {
        println!("Tenant already has {} ingredients, skipping seed.", existing.len());
        println!("Delete the database file or pick another tenant to regenerate.");
        return Ok(());
    }

    // Pantry
    let mut ids: HashMap<&str, String> = HashMap::new();
    for (name, unit, price, format, stock, min) in PANTRY {
        let mut input = NewIngredient::new(*name, *unit, *price)
            .with_stock(*stock)
            .with_min_stock(*min);
        if let Some(format) = format {
            input = input.with_format(*format);
        }
        let ingredient = engine.db().ingredients().create(&tenant, &input).await?;
        ids.insert(*name, ingredient.id);
    }
    println!("Created {} ingredients", ids.len());

    // Menu
    let mut recipes = Vec::new();
    for (name, portions, price, lines) in MENU {
        let mut input = NewRecipe::new(*name, *portions, *price);
        for (ingredient, quantity) in lines.iter() {
            if let Some(id) = ids.get(ingredient) {
                input = input.line(id.clone(), *quantity);
            }
        }
        recipes.push(engine.db().recipes().create(&tenant, &input).await?);
    }
    println!("Created {} recipes", recipes.len());

    // A received delivery; tomatoes arrive dearer than the catalog price
    let today = Utc::now().date_naive();
    let mut order = NewPurchaseOrder::new().with_supplier("DEMO-0001").received();
    for (name, quantity, price) in [("Tomato", 10.0, 360), ("Potato", 20.0, 180), ("Beef Mince", 5.0, 1390)] {
        if let Some(id) = ids.get(name) {
            order = order.line(id.clone(), quantity, price);
        }
    }
    let order = engine.purchases().create_order(&tenant, &order).await?;
    println!("Received purchase order {} ({})", order.id, order.total());

    // A week of sales, busiest on the last days
    let mut sold = 0;
    for day in 0..7_i64 {
        let date = today - Duration::days(6 - day);
        for (index, recipe) in recipes.iter().enumerate() {
            let quantity = ((day + 1) * (index as i64 + 1) % 7 + 1) as f64;
            engine
                .sales()
                .process_sale(&tenant, &SaleInput::new(&recipe.id, quantity, date))
                .await?;
            sold += 1;
        }
    }
    println!("Registered {} sales", sold);

    if let Some(basil) = ids.get("Basil") {
        engine
            .waste()
            .record_waste(&tenant, &[WasteInput::ingredient(basil.clone(), 0.05, "wilted", today)])
            .await?;
        println!("Recorded waste");
    }

    // Report
    let report = engine
        .menu()
        .classify_period(&tenant, today - Duration::days(6), today)
        .await?;

    println!();
    println!("Menu engineering (last 7 days)");
    println!("  mean popularity: {:.1}", report.mean_popularity);
    for item in &report.items {
        println!(
            "  {:<12} {:>6.1} sold  margin {:>7.2}  {}",
            item.name,
            item.popularity,
            item.margin_cents / 100.0,
            item.quadrant.as_str()
        );
    }

    let sales = engine
        .reports()
        .sales(&tenant, today - Duration::days(6), today)
        .await?;
    println!();
    println!("Revenue {}  cost {}  gross profit {}", sales.totals.revenue, sales.totals.ingredient_cost, sales.gross_profit());

    // Let the subscribers drain before exit
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let alerts = engine.reports().alerts(&tenant).await?;
    println!("Alerts raised: {}", alerts.len());

    println!();
    println!("Seed complete!");
    Ok(())
}
