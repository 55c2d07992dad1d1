use predicates::prelude::*;

#[test]
fn zodiac_prints_sign_for_date() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("zodiac-enrich");
    cmd.args(["zodiac", "--date", "1974-11-11"])
        .assert()
        .success()
        .stdout("Scorpio\n");
}

#[test]
fn zodiac_handles_cusp_dates() {
    for (date, sign) in [
        ("1990-03-20", "Pisces\n"),
        ("1990-03-21", "Aries\n"),
        ("1990-12-22", "Capricorn\n"),
        ("1990-01-20", "Aquarius\n"),
    ] {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("zodiac-enrich");
        cmd.args(["zodiac", "--date", date])
            .assert()
            .success()
            .stdout(sign);
    }
}

#[test]
fn zodiac_rejects_malformed_date() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("zodiac-enrich");
    cmd.args(["zodiac", "--date", "11/11/1974"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("YYYY-MM-DD"));
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("zodiac-enrich");
    cmd.env("RUST_LOG", "debug")
        .args(["zodiac", "--date", "2000-02-29"])
        .assert()
        .success()
        .stdout("Pisces\n")
        .stderr(predicate::str::contains("parsed cli"));
}
