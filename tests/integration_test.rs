use std::io::Write;

use assert_cmd::Command;
use predicates as pred;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn journal(rows: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    writeln!(file, "op,actor,subject,amount,reference,detail\n{}", rows).unwrap();
    file
}

fn coin_ledger() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_coin_ledger"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn end_to_end_outputs_expected_balances_and_withdrawals() {
    // user 1: buys gold (1200), messages user 2 (-20), sends a teddy (-100) = 1080.
    //         A 600 coin withdrawal is rejected, so the hold comes back.
    // user 2: earns 10, trades the teddy for 60, buys platinum (6500) = 6570,
    //         then withdraws 1000 at 60% and is paid 600.00.
    let file = journal(
        "purchase,1,,,pay_001,gold_pack\n\
         purchase,1,,,pay_001,gold_pack\n\
         message,1,2,,chat_1,gold\n\
         gift,1,2,,,teddy\n\
         trade,2,,,,\n\
         purchase,2,,,pay_002,platinum_pack\n\
         withdraw,2,,1000,,upi:alice@okbank\n\
         approve,99,,,1,\n\
         paid,99,,,1,\n\
         withdraw,1,,600,,bank:Asha Rao:123456789012:HDFC0001234\n\
         reject,99,,,2,name mismatch\n\
         paid,99,,,2,\n\
         withdraw,1,,100,,upi:asha@okbank\n\
         refund,1,,,,",
    );

    let assert = coin_ledger()
        .arg(file.path())
        .assert()
        .success()
        .stdout(pred::str::contains("\n1,1080,0,0,"))
        .stdout(pred::str::contains("\n2,5570,0,0,"))
        .stdout(pred::str::contains("1,2,1000,60,600.00,paid"))
        .stdout(pred::str::contains("2,1,600,50,300.00,rejected"))
        .stdout(pred::str::contains("\n3,").not())
        .stderr(pred::str::contains("reply=Duplicate transaction"))
        .stderr(pred::str::contains("Cannot pay withdrawal 2 in state rejected"))
        .stderr(pred::str::contains("below the minimum"))
        .stderr(pred::str::contains("Invalid command type: refund"));

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    for header in [
        "user,balance,held_amount,pending_gifts,version",
        "id,user,coins,payout_percentage,payout_inr,status",
    ] {
        assert_eq!(stdout.matches(header).count(), 1, "{header} in\n{stdout}");
    }
}

#[test]
fn custom_catalog_changes_prices_and_payouts() {
    let mut catalog = NamedTempFile::new().expect("create temp file");
    write!(
        catalog,
        r#"{{
            "plans": [{{"id": "starter", "tier": "basic", "priceInINR": "10.00",
                "baseCoins": 2000, "bonusCoins": 0, "totalCoins": 2000,
                "isActive": true, "displayOrder": 1}}],
            "slabs": [{{"id": "flat", "minCoins": 0, "maxCoins": null,
                "payoutPercentage": "80", "displayOrder": 1}}],
            "messageCosts": {{"perTier": {{"basic": 5}}, "videoCall": 40,
                "earningPercentage": "0"}},
            "gifts": []
        }}"#
    )
    .unwrap();

    let file = journal(
        "purchase,7,,,pay_7,starter\n\
         message,7,8,,chat_7,basic\n\
         message,7,8,,chat_8,gold\n\
         withdraw,7,,1000,,upi:seven@okbank",
    );

    coin_ledger()
        .arg("--catalog")
        .arg(catalog.path())
        .arg(file.path())
        .assert()
        .success()
        .stdout(pred::str::contains("\n7,995,1000,0,"))
        .stdout(pred::str::contains("1,7,1000,80,800.00,pending"))
        .stdout(pred::str::contains("\n8,").not())
        .stderr(pred::str::contains("Unknown tier: gold"));
}

#[test]
fn invalid_catalog_is_fatal() {
    let mut catalog = NamedTempFile::new().expect("create temp file");
    write!(catalog, "{{\"plans\": []").unwrap();
    let file = journal("purchase,1,,,pay_1,gold_pack");

    coin_ledger()
        .arg("--catalog")
        .arg(catalog.path())
        .arg(file.path())
        .assert()
        .failure()
        .stderr(pred::str::contains("Config("));
}

#[test]
fn missing_journal_argument_fails() {
    coin_ledger().assert().failure();
}
