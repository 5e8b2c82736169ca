fn main() {
    wolf_goat_pig::cli::run();
}
