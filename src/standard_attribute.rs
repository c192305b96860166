use std::fmt;

macro_rules! standard_attributes {
    ($($variant:ident => $name:literal,)*) => {
        /// Attributes every IMAQdx camera session knows under a fixed name.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StandardAttribute {
            $($variant,)*
        }

        impl StandardAttribute {
            /// Every standard attribute, in declaration order.
            pub const ALL: &'static [StandardAttribute] = &[$(StandardAttribute::$variant,)*];

            /// Fully qualified driver name, e.g. `AcquisitionAttributes::Width`.
            pub fn full_name(self) -> &'static str {
                match self {
                    $(StandardAttribute::$variant => $name,)*
                }
            }
        }
    };
}

standard_attributes! {
    BaseAddress => "CameraInformation::BaseAddress",
    BusType => "CameraInformation::BusType",
    ModelName => "CameraInformation::ModelName",
    SerialNumberHigh => "CameraInformation::SerialNumberHigh",
    SerialNumberLow => "CameraInformation::SerialNumberLow",
    VendorName => "CameraInformation::VendorName",
    HostIPAddress => "CameraInformation::HostIPAddress",
    IPAddress => "CameraInformation::IPAddress",
    PrimaryUrlString => "CameraInformation::PrimaryURLString",
    SecondaryUrlString => "CameraInformation::SecondaryURLString",
    AcquisitionInProgress => "StatusInformation::AcqInProgress",
    LastBufferCount => "StatusInformation::LastBufferCount",
    LastBufferNumber => "StatusInformation::LastBufferNumber",
    LostBufferCount => "StatusInformation::LostBufferCount",
    LostPacketCount => "StatusInformation::LostPacketCount",
    RequestedResendPacketCount => "StatusInformation::RequestedResendPacketCount",
    ReceivedResendPackets => "StatusInformation::ReceivedResendPackets",
    HandledEventCount => "StatusInformation::HandledEventCount",
    LostEventCount => "StatusInformation::LostEventCount",
    BayerGainB => "AcquisitionAttributes::Bayer::GainB",
    BayerGainG => "AcquisitionAttributes::Bayer::GainG",
    BayerGainR => "AcquisitionAttributes::Bayer::GainR",
    BayerPattern => "AcquisitionAttributes::Bayer::Pattern",
    StreamChannelMode => "AcquisitionAttributes::Controller::StreamChannelMode",
    DesiredStreamChannel => "AcquisitionAttributes::Controller::DesiredStreamChannel",
    FrameInterval => "AcquisitionAttributes::FrameInterval",
    IgnoreFirstFrame => "AcquisitionAttributes::IgnoreFirstFrame",
    OffsetX => "AcquisitionAttributes::OffsetX",
    OffsetY => "AcquisitionAttributes::OffsetY",
    Width => "AcquisitionAttributes::Width",
    Height => "AcquisitionAttributes::Height",
    PixelFormat => "AcquisitionAttributes::PixelFormat",
    PacketSize => "AcquisitionAttributes::PacketSize",
    PayloadSize => "AcquisitionAttributes::PayloadSize",
    Speed => "AcquisitionAttributes::Speed",
    ShiftPixelBits => "AcquisitionAttributes::ShiftPixelBits",
    SwapPixelBytes => "AcquisitionAttributes::SwapPixelBytes",
    OverwriteMode => "AcquisitionAttributes::OverwriteMode",
    Timeout => "AcquisitionAttributes::Timeout",
    VideoMode => "AcquisitionAttributes::VideoMode",
    BitsPerPixel => "AcquisitionAttributes::BitsPerPixel",
    PixelSignedness => "AcquisitionAttributes::PixelSignedness",
    ReserveDualPackets => "AcquisitionAttributes::ReserveDualPackets",
    ReceiveTimestampMode => "AcquisitionAttributes::ReceiveTimestampMode",
    ActualPeakBandwidth =>
        "AcquisitionAttributes::AdvancedEthernet::BandwidthControl::ActualPeakBandwidth",
    DesiredPeakBandwidth =>
        "AcquisitionAttributes::AdvancedEthernet::BandwidthControl::DesiredPeakBandwidth",
    DestinationMode => "AcquisitionAttributes::AdvancedEthernet::Controller::DestinationMode",
    DestinationMulticastAddress =>
        "AcquisitionAttributes::AdvancedEthernet::Controller::DestinationMulticastAddress",
    EventsEnabled => "AcquisitionAttributes::AdvancedEthernet::EventParameters::EventsEnabled",
    MaxOutstandingEvents =>
        "AcquisitionAttributes::AdvancedEthernet::EventParameters::MaxOutstandingEvents",
    LostPacketMode => "AcquisitionAttributes::AdvancedEthernet::LostPacketMode",
    MemoryWindowSize =>
        "AcquisitionAttributes::AdvancedEthernet::ResendParameters::MemoryWindowSize",
    ResendsEnabled => "AcquisitionAttributes::AdvancedEthernet::ResendParameters::ResendsEnabled",
    ResendThresholdPercentage =>
        "AcquisitionAttributes::AdvancedEthernet::ResendParameters::ResendThresholdPercentage",
    ResendBatchingPercentage =>
        "AcquisitionAttributes::AdvancedEthernet::ResendParameters::ResendBatchingPercentage",
    MaxResendsPerPacket =>
        "AcquisitionAttributes::AdvancedEthernet::ResendParameters::MaxResendsPerPacket",
    ResendResponseTimeout =>
        "AcquisitionAttributes::AdvancedEthernet::ResendParameters::ResendResponseTimeout",
    NewPacketTimeout =>
        "AcquisitionAttributes::AdvancedEthernet::ResendParameters::NewPacketTimeout",
    MissingPacketTimeout =>
        "AcquisitionAttributes::AdvancedEthernet::ResendParameters::MissingPacketTimeout",
    ResendTimerResolution =>
        "AcquisitionAttributes::AdvancedEthernet::ResendParameters::ResendTimerResolution",
}

impl fmt::Display for StandardAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_name())
    }
}
