fn main() {
    sigdefer::sigwatch_main()
}
