//! Confirm Email Example
//!
//! Scripted walk through a sign-up form:
//! - `confirmEmail` must be present and match `email`
//! - `phone` is required only while `contactByPhone` is checked
//!
//! Run with `cargo run -p formwatch --example confirm_email`.

use std::time::Duration;

use formwatch::prelude::*;
use log::{LevelFilter, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::time::sleep;

fn build_form() -> FormGroup {
    FormGroup::builder()
        .control("email", "", vec![required(), email()])
        .control("confirmEmail", "", vec![required()])
        .control("contactByPhone", false, vec![])
        .control("phone", "", vec![])
        .build()
}

fn rule_sets(form: &FormGroup) -> Vec<RuleSet> {
    let email_field = form.control("email").expect("form has an email field");
    let match_email = Rule::named("match_email", move |v: &Value| {
        if &email_field.value() == v {
            Ok(())
        } else {
            Err(Violation::new("emailMismatch", "Emails do not match"))
        }
    });

    let checkbox = form
        .control("contactByPhone")
        .expect("form has a contactByPhone field");
    let phone_required = require_if(move || checkbox.value().as_bool().unwrap_or(false));

    vec![
        RuleSet::new(["email", "confirmEmail"], move |_| {
            Some(RuleAssignment::new().assign("confirmEmail", [required(), match_email.clone()]))
        })
        .expect("triggers are not empty")
        .with_label("confirm-email"),
        RuleSet::new(["contactByPhone", "phone"], move |_| {
            Some(RuleAssignment::new().assign("phone", phone_required.clone()))
        })
        .expect("triggers are not empty")
        .with_label("phone"),
    ]
}

/// Print errors the way a UI would: only for fields the user has touched.
fn report(form: &FormGroup) {
    for name in form.control_names() {
        let Some(control) = form.control(name) else {
            continue;
        };
        if !control.is_dirty() {
            continue;
        }
        match control.status() {
            FieldStatus::Valid => info!("  {:<15} ok", name),
            FieldStatus::Invalid(violations) => {
                for violation in violations {
                    info!("  {:<15} {}", name, violation.message);
                }
            }
        }
    }
}

async fn pause() {
    sleep(Duration::from_millis(300)).await;
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    TermLogger::init(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .expect("Failed to initialize logger");

    let validator = FormValidator::new();
    let form = build_form();
    let cx = validator.create_context(form.clone());
    cx.validate(rule_sets(&form));

    let field = |name: &str| form.control(name).expect("field exists");

    info!("typing email");
    for text in ["a", "ad", "ada", "ada@example.com"] {
        field("email").input(text);
        sleep(Duration::from_millis(40)).await;
    }
    pause().await;
    report(&form);

    info!("typing a mismatched confirmation");
    field("confirmEmail").input("ada@exmaple.com");
    pause().await;
    report(&form);

    info!("fixing the confirmation");
    field("confirmEmail").input("ada@example.com");
    pause().await;
    report(&form);

    info!("asking to be contacted by phone");
    field("contactByPhone").input(true);
    pause().await;
    report(&form);

    info!("entering a phone number");
    field("phone").input("555-0100");
    pause().await;
    report(&form);

    info!("form valid: {}", form.is_valid());
    validator.destroy();
}
