fn main() -> anyhow::Result<()> {
    send_video_lib::run()
}
