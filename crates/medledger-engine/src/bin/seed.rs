//! # Seed Data Generator
//!
//! Populates a development database through the transaction engine, so the
//! stock and balance journals are consistent from the first row.
//!
//! ## Usage
//! ```bash
//! # Default database from medledger.toml / MEDLEDGER_DB_PATH
//! cargo run -p medledger-engine --bin seed
//!
//! # Specify database path and number of invoices
//! cargo run -p medledger-engine --bin seed -- --db ./data/medledger.db --invoices 50
//! ```
//!
//! ## Generated Data
//! - A catalogue of common formulations (tablets, syrups, injectables)
//! - Two suppliers, each delivering one purchase bill with two lots per product
//! - A handful of chemist customers
//! - Credit and cash invoices picked FEFO, plus one sales return

use chrono::{Days, Months};
use std::env;
use std::path::PathBuf;

use medledger_core::{Actor, GstRate, Money, PartyKind, Role};
use medledger_db::{Database, NewParty, NewProduct};
use medledger_engine::telemetry::init_tracing;
use medledger_engine::{
    CreateInvoice, CreateSalesReturn, LedgerConfig, PurchaseLine, RecordPurchase, ReturnLine,
    SaleLine, TransactionEngine,
};

/// (name, manufacturer, hsn, gst %, purchase paise, sale paise)
const CATALOGUE: &[(&str, &str, &str, u32, i64, i64)] = &[
    ("Paracetamol 500mg Tab", "Sun Remedies", "3004", 12, 1_450, 2_100),
    ("Amoxicillin 250mg Cap", "Cipla Labs", "3004", 12, 5_800, 8_250),
    ("Cetirizine 10mg Tab", "Mankind Pharma", "3004", 12, 900, 1_600),
    ("Azithromycin 500mg Tab", "Alkem", "3004", 12, 7_400, 11_000),
    ("Cough Syrup 100ml", "Dabur", "3004", 12, 6_200, 9_500),
    ("Insulin Glargine 100IU", "Biocon", "3004", 5, 48_000, 62_000),
    ("ORS Sachet 21g", "FDC", "3004", 5, 1_200, 2_000),
    ("Surgical Gloves (pair)", "Kanam Latex", "4015", 18, 1_800, 3_000),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("City Chemists", "+919800000101"),
    ("Apollo Medicals", "+919800000102"),
    ("Sai Pharmacy", "+919800000103"),
    ("Jeevan Drug House", "+919800000104"),
];

const SUPPLIERS: &[&str] = &["Sun Distributors", "Cipla Stockist North"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut invoices: usize = 20;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--invoices" | "-n" => {
                if i + 1 < args.len() {
                    invoices = args[i + 1].parse().unwrap_or(20);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("MedLedger Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: from config)");
                println!("  -n, --invoices <N>     Number of invoices to create (default: 20)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = LedgerConfig::load(None)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("MedLedger Seed Data Generator");
    println!("=============================");
    println!("Database: {}", config.database.path.display());
    println!("Invoices: {}", invoices);
    println!();

    let db = Database::new(config.database.to_db_config()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let engine = TransactionEngine::new(db.clone(), &config);
    let today = engine.business_date();
    let start = std::time::Instant::now();

    // Catalogue
    let mut products = Vec::with_capacity(CATALOGUE.len());
    for (name, manufacturer, hsn, gst, _, _) in CATALOGUE {
        let product = db
            .products()
            .insert(NewProduct {
                name: name.to_string(),
                manufacturer: Some(manufacturer.to_string()),
                hsn_code: hsn.to_string(),
                default_gst_rate: GstRate::from_percent(*gst),
            })
            .await?;
        products.push(product);
    }
    println!("✓ {} products", products.len());

    // Parties
    let mut customers = Vec::with_capacity(CUSTOMERS.len());
    for (name, phone) in CUSTOMERS {
        let customer = db
            .parties()
            .insert(NewParty {
                kind: PartyKind::Customer,
                name: name.to_string(),
                tax_id: None,
                phone: Some(phone.to_string()),
                email: None,
            })
            .await?;
        customers.push(customer);
    }

    let mut suppliers = Vec::with_capacity(SUPPLIERS.len());
    for name in SUPPLIERS {
        let supplier = db
            .parties()
            .insert(NewParty {
                kind: PartyKind::Supplier,
                name: name.to_string(),
                tax_id: None,
                phone: None,
                email: None,
            })
            .await?;
        suppliers.push(supplier);
    }
    println!("✓ {} customers, {} suppliers", customers.len(), suppliers.len());

    // Two lots per product: a near-expiry one and a fresh one
    for (s_idx, supplier) in suppliers.iter().enumerate() {
        let mut lines = Vec::new();
        for (p_idx, (product, row)) in products.iter().zip(CATALOGUE).enumerate() {
            if p_idx % suppliers.len() != s_idx {
                continue;
            }
            let (_, _, _, _, purchase_paise, sale_paise) = *row;
            for (lot, months) in [(1u32, 4u32), (2, 18)] {
                let expiry = today
                    .checked_add_months(Months::new(months))
                    .unwrap_or_else(|| today + Days::new(30 * months as u64));
                lines.push(PurchaseLine {
                    product_id: product.id.clone(),
                    batch_number: format!("B{}{:02}{}", s_idx + 1, p_idx, lot),
                    expiry_date: expiry,
                    quantity: 500,
                    purchase_price: Money::from_paise(purchase_paise),
                    sale_price: Money::from_paise(sale_paise),
                    gst_rate: None,
                });
            }
        }

        let posted = engine
            .record_purchase(RecordPurchase {
                supplier_id: supplier.id.clone(),
                supplier_reference: Some(format!("SUP-{}", s_idx + 1)),
                lines,
            })
            .await?;
        println!(
            "✓ Purchase {} from {} ({})",
            posted.purchase.bill_number,
            supplier.name,
            posted.purchase.total_amount()
        );
    }

    // Invoices
    let actor = Actor::new("seed", Role::Admin, true);
    let mut first_invoice = None;
    for n in 0..invoices {
        let customer = &customers[n % customers.len()];
        let lines = (0..3)
            .map(|k| {
                let product = &products[(n + k * 3) % products.len()];
                SaleLine::new(product.id.clone(), 1 + ((n + k) % 10) as i64)
            })
            .collect();

        let posted = engine
            .create_sale(CreateInvoice {
                customer_id: customer.id.clone(),
                rep_id: None,
                actor: actor.clone(),
                lines,
                is_cash: n % 4 == 0,
                discount: Money::zero(),
            })
            .await?;

        if first_invoice.is_none() {
            first_invoice = Some(posted.clone());
        }
    }
    println!("✓ {} invoices", invoices);

    if let Some(posted) = first_invoice {
        if let Some(item) = posted.items.first() {
            let credit = engine
                .create_sales_return(CreateSalesReturn {
                    invoice_id: posted.invoice.id.clone(),
                    lines: vec![ReturnLine::new(item.id.clone(), 1, "Damaged strip")],
                })
                .await?;
            println!("✓ Credit note {}", credit.credit_note.return_number);
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Seed complete in {:?}", elapsed);
    println!(
        "  Pending notifications: {}",
        db.outbox().count_pending().await?
    );

    Ok(())
}
