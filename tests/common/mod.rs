use assert_cmd::Command;

pub fn kindred_bin() -> Command {
    #[allow(deprecated)]
    {
        Command::cargo_bin("kindred").expect("kindred test binary should build")
    }
}
